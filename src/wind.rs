use ndarray::{s, Array1, Array3, ArrayView3, ArrayViewMut3};

/// A three-component wind field stored as one owned flattened buffer.
///
/// Layout is (component, z, y, x) in row-major order, component order
/// u, v, w. Every update (relaxation step, coarse correction) goes through
/// this buffer; the component accessors return views into it, so the flat
/// vector and the reshaped components can never disagree.
#[derive(Clone, Debug)]
pub struct WindField {
    data: Array1<f64>,
    shape: (usize, usize, usize),
}

pub const U: usize = 0;
pub const V: usize = 1;
pub const W: usize = 2;

impl WindField {
    /// Stack three co-located component arrays into one owned buffer.
    pub fn from_components(u: &Array3<f64>, v: &Array3<f64>, w: &Array3<f64>) -> Self {
        let shape = u.dim();
        let n = u.len();
        let mut data = Array1::zeros(3 * n);
        for (c, comp) in [u, v, w].into_iter().enumerate() {
            data.slice_mut(s![c * n..(c + 1) * n])
                .iter_mut()
                .zip(comp.iter())
                .for_each(|(dst, &src)| *dst = src);
        }
        Self { data, shape }
    }

    /// Wrap an already-flattened (3, nz, ny, nx) vector.
    pub fn from_flat(data: Array1<f64>, shape: (usize, usize, usize)) -> Self {
        debug_assert_eq!(data.len(), 3 * shape.0 * shape.1 * shape.2);
        Self { data, shape }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    fn component_len(&self) -> usize {
        self.shape.0 * self.shape.1 * self.shape.2
    }

    /// Read-only 3D view of one component (0 = u, 1 = v, 2 = w).
    pub fn component(&self, c: usize) -> ArrayView3<'_, f64> {
        let n = self.component_len();
        self.data
            .slice(s![c * n..(c + 1) * n])
            .into_shape_with_order(self.shape)
            .expect("component slice is contiguous")
    }

    /// Mutable 3D view of one component.
    pub fn component_mut(&mut self, c: usize) -> ArrayViewMut3<'_, f64> {
        let n = self.component_len();
        let shape = self.shape;
        self.data
            .slice_mut(s![c * n..(c + 1) * n])
            .into_shape_with_order(shape)
            .expect("component slice is contiguous")
    }

    /// The flattened wind vector.
    pub fn flat(&self) -> &Array1<f64> {
        &self.data
    }

    pub fn flat_mut(&mut self) -> &mut Array1<f64> {
        &mut self.data
    }

    /// Copies of the three components as owned arrays (u, v, w).
    pub fn to_components(&self) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
        (
            self.component(U).to_owned(),
            self.component(V).to_owned(),
            self.component(W).to_owned(),
        )
    }
}

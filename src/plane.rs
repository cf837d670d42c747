use crate::error::{BlendError, BlendResult};

/// Row-major raster buffer owned by exactly one holder at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> Plane<T> {
    /// Allocate a plane filled with `value`, reporting allocation failure as an error.
    pub fn try_filled(width: usize, height: usize, value: T) -> BlendResult<Self> {
        let elements = width.saturating_mul(height);
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|source| BlendError::Allocation { elements, source })?;
        data.resize(elements, value);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a plane by evaluating `f(x, y)` for every pixel.
    pub fn try_from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> BlendResult<Self> {
        let elements = width.saturating_mul(height);
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|source| BlendError::Allocation { elements, source })?;
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    /// Pixel at `(x, y)` if it lies inside the plane.
    pub fn get_checked(&self, x: i64, y: i64) -> Option<T> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(self.get(x as usize, y as usize))
        }
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Apply `f` to every element in place.
    pub fn map_in_place(&mut self, mut f: impl FnMut(T) -> T) {
        for value in &mut self.data {
            *value = f(*value);
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

//! Memory buffers bound to computations.

use crate::error::{Error, Result};
use crate::expr::ElementType;

/// What a buffer is for, from the function's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageRole {
    Input,
    Output,
    Temporary,
}

/// A memory object. Computations write into buffers through their access
/// relations; buffers listed as function arguments are passed in from
/// outside, the rest are allocated by the function itself.
#[derive(Clone, Debug)]
pub struct Buffer {
    name: String,
    sizes: Vec<i64>,
    ty: ElementType,
    role: StorageRole,
    /// Preloaded contents, for binding a computation to existing data.
    data: Option<Vec<u8>>,
}

impl Buffer {
    pub fn new(
        name: &str,
        sizes: Vec<i64>,
        ty: ElementType,
        role: StorageRole,
        data: Option<Vec<u8>>,
    ) -> Result<Buffer> {
        if name.is_empty() {
            return Err(Error::Backend("buffer name is empty".to_owned()));
        }
        if sizes.is_empty() {
            return Err(Error::Backend(format!(
                "buffer `{}` must have at least one dimension",
                name
            )));
        }
        if let Some(bad) = sizes.iter().find(|s| **s <= 0) {
            return Err(Error::Backend(format!(
                "buffer `{}` has non-positive dimension size {}",
                name, bad
            )));
        }
        if let Some(data) = &data {
            let elems: i64 = sizes.iter().product();
            let expected = elems as usize * ty.size_bytes();
            if data.len() != expected {
                return Err(Error::Backend(format!(
                    "buffer `{}` preloaded data is {} bytes, shape needs {}",
                    name,
                    data.len(),
                    expected
                )));
            }
        }
        Ok(Buffer {
            name: name.to_owned(),
            sizes,
            ty,
            role,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize {
        self.sizes.len()
    }

    /// Per-dimension sizes, leftmost dimension first.
    pub fn sizes(&self) -> &[i64] {
        &self.sizes
    }

    pub fn ty(&self) -> ElementType {
        self.ty
    }

    pub fn role(&self) -> StorageRole {
        self.role
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_preloaded_data() {
        let err = Buffer::new(
            "b",
            vec![2, 2],
            ElementType::UInt8,
            StorageRole::Input,
            Some(vec![0u8; 3]),
        );
        assert!(err.is_err());

        let ok = Buffer::new(
            "b",
            vec![2, 2],
            ElementType::UInt8,
            StorageRole::Input,
            Some(vec![0u8; 4]),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_empty_shape() {
        assert!(Buffer::new("b", vec![], ElementType::Float32, StorageRole::Output, None).is_err());
    }
}

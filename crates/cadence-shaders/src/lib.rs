//! Shaders for the Cadence demo renderers.
//!
//! WGSL sources live in `shaders/` and are compiled to SPIR-V at build time
//! with naga. Each module keeps all of its entry points.

use std::ffi::CStr;
use std::sync::OnceLock;

/// Embedded SPIR-V bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    pub static HELLO_TRIANGLE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/hello_triangle.spv"));
}

/// Vertex entry point of [`hello_triangle`].
pub const HELLO_TRIANGLE_VERTEX_ENTRY: &CStr = c"vs_main";
/// Fragment entry point of [`hello_triangle`].
pub const HELLO_TRIANGLE_FRAGMENT_ENTRY: &CStr = c"fs_main";

/// Convert byte slice to aligned u32 words (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static HELLO_TRIANGLE_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Colored-triangle vertex and fragment shaders.
pub fn hello_triangle() -> &'static [u32] {
    HELLO_TRIANGLE_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::HELLO_TRIANGLE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_triangle_loads() {
        let shader = hello_triangle();
        assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
        assert_eq!(
            shader.len() * 4,
            spirv_bytes::HELLO_TRIANGLE.len(),
            "SPIR-V byte length must be a multiple of 4"
        );
    }

    #[test]
    fn entry_point_names_are_embedded() {
        let bytes = spirv_bytes::HELLO_TRIANGLE;
        for entry in [HELLO_TRIANGLE_VERTEX_ENTRY, HELLO_TRIANGLE_FRAGMENT_ENTRY] {
            let name = entry.to_bytes();
            assert!(
                bytes.windows(name.len()).any(|window| window == name),
                "missing entry point {entry:?}"
            );
        }
    }
}

//! Build script to compile WGSL shaders to SPIR-V with naga.

use std::env;
use std::fs;
use std::path::Path;

const SHADERS: &[&str] = &["hello_triangle"];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let shader_dir = Path::new("shaders");

    println!("cargo:rerun-if-changed=shaders/");

    for name in SHADERS {
        let input = shader_dir.join(format!("{name}.wgsl"));
        let output = Path::new(&out_dir).join(format!("{name}.spv"));
        if let Err(e) = compile_shader(&input, &output) {
            panic!("Failed to compile {}: {e}", input.display());
        }
    }
}

/// Parse, validate and emit one WGSL file as SPIR-V containing all its entry points.
fn compile_shader(input: &Path, output: &Path) -> Result<(), String> {
    let source = fs::read_to_string(input).map_err(|e| format!("read error: {e}"))?;

    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(&source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| format!("Validation error: {e:?}"))?;

    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        ..naga::back::spv::Options::default()
    };
    let words = naga::back::spv::write_vec(&module, &info, &options, None)
        .map_err(|e| format!("SPIR-V generation error: {e}"))?;

    fs::write(output, bytemuck::cast_slice::<u32, u8>(&words))
        .map_err(|e| format!("write error: {e}"))
}

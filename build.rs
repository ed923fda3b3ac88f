//! Build script for textsnap.
//!
//! On macOS: generate swift-bridge FFI glue for the Apple Vision
//! recognizer, compile the Swift bridge into a static library and link the
//! frameworks it needs. Other platforms use the tesseract CLI and need no
//! native build step.
//!
//! All generated files go to OUT_DIR (inside target/).

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(target_os = "macos")]
    macos::build_swift_bridge();
}

#[cfg(target_os = "macos")]
mod macos {
    use std::path::PathBuf;

    pub fn build_swift_bridge() {
        let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
        let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
        let swift_src_dir = manifest_dir.join("swift-src");
        let generated_dir = out_dir.join("swift-bridge-generated");

        println!("cargo:rerun-if-changed=src/ocr/apple_vision.rs");
        println!("cargo:rerun-if-changed=swift-src/vision_bridge.swift");

        // Step 1: Generate FFI glue to OUT_DIR
        swift_bridge_build::parse_bridges(vec!["src/ocr/apple_vision.rs"])
            .write_all_concatenated(&generated_dir, env!("CARGO_PKG_NAME"));

        // Step 2: Generate bridging header with absolute paths
        let bridging_header = out_dir.join("bridging-header.h");
        std::fs::write(
            &bridging_header,
            format!(
                "#ifndef BridgingHeader_h\n\
                 #define BridgingHeader_h\n\
                 #include \"{generated}/SwiftBridgeCore.h\"\n\
                 #include \"{generated}/{pkg}/{pkg}.h\"\n\
                 #endif\n",
                generated = generated_dir.display(),
                pkg = env!("CARGO_PKG_NAME"),
            ),
        )
        .expect("Failed to write bridging header");

        // Step 3: Compile Swift → static library in OUT_DIR
        let lib_output = out_dir.join("libvision_swift.a");
        let pkg = env!("CARGO_PKG_NAME");

        let status = std::process::Command::new("swiftc")
            .args(["-emit-library", "-static"])
            .args(["-module-name", "vision_swift"])
            .arg("-import-objc-header")
            .arg(&bridging_header)
            .arg(swift_src_dir.join("vision_bridge.swift"))
            .arg(generated_dir.join("SwiftBridgeCore.swift"))
            .arg(generated_dir.join(format!("{pkg}/{pkg}.swift")))
            .arg("-o")
            .arg(&lib_output)
            .arg("-O")
            .status()
            .expect("Failed to run swiftc — is Xcode Command Line Tools installed?");

        if !status.success() {
            panic!("swiftc compilation failed");
        }

        // Step 4: Link the static library + macOS frameworks
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rustc-link-lib=static=vision_swift");

        for framework in ["Vision", "NaturalLanguage", "CoreGraphics", "Foundation", "ImageIO"] {
            println!("cargo:rustc-link-lib=framework={}", framework);
        }

        // Swift runtime search paths
        let xcode_path = std::process::Command::new("xcode-select")
            .arg("--print-path")
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_else(|_| "/Applications/Xcode.app/Contents/Developer".to_string());

        println!(
            "cargo:rustc-link-search={}/Toolchains/XcodeDefault.xctoolchain/usr/lib/swift/macosx/",
            xcode_path
        );
        println!("cargo:rustc-link-search=/usr/lib/swift");
    }
}

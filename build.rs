use std::env;
use std::fs;
use std::path::Path;

fn main() {
    copy_config();
}

/// Copies keypad.json to the target directory so the executable finds it next to itself.
fn copy_config() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };
    // OUT_DIR is something like target/release/build/keypad-ocr-xxx/out
    let Some(target_dir) = Path::new(&out_dir).ancestors().nth(3) else {
        return;
    };

    let config_src = Path::new("keypad.json");
    let config_dst = target_dir.join("keypad.json");

    if config_src.exists() {
        let _ = fs::copy(config_src, &config_dst);
    }
    println!("cargo:rerun-if-changed=keypad.json");
}

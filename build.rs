use chrono::Local;

fn main() {
    let time = Local::now();
    let content = format!(
        "pub(crate) const BUILD_TIME: &str = \"{}\";",
        time.format("%d-%m-%Y %H:%M:%S")
    );
    let out_dir = match std::env::var("OUT_DIR") {
        Ok(dir) => dir,
        Err(e) => {
            println!("cargo:warning=OUT_DIR is not set: {}", e);
            return;
        }
    };
    let path = format!("{}/build_time.rs", out_dir);
    if let Err(e) = std::fs::write(path, content) {
        println!("failed to write build time: {}", e);
    }
    println!("cargo:rerun-if-changed=build.rs");
}

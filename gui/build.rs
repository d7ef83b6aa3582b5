fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    fn watch_dir(path: &std::path::Path) {
        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                let p = entry.path();
                println!("cargo:rerun-if-changed={}", p.display());
                if p.is_dir() {
                    watch_dir(&p);
                }
            }
        }
    }
    watch_dir(std::path::Path::new("resources"));

    glib_build_tools::compile_resources(
        &["resources"],
        "resources/resources.gresource.xml",
        "medremind.gresource",
    );
}

fn main() {
    // The web view shell is optional; the detection core builds without it.
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }
}

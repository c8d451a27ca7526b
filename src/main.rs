//! use-storage demo
//!
//! Web: binds a visit counter to `localStorage` and logs changes made in
//! other tabs. Native: two cells share one key in the in-memory area and
//! sync when another context writes it.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_demo {
    use use_storage::{StorageError, use_storage};

    const VISITS_KEY: &str = "use_storage_visits";

    pub fn run() -> Result<(), StorageError> {
        let visits = use_storage(VISITS_KEY, 0u32, None)?;
        visits.set(visits.get() + 1)?;
        log::info!("Visit #{}", visits.get());

        visits
            .watch(|n| log::info!("Visit count changed in another tab: {}", n))
            .forget();

        // Keep listening for the lifetime of the page
        std::mem::forget(visits);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

    if let Err(e) = wasm_demo::run() {
        log::error!("Storage demo failed: {}", e);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("use-storage (native) starting...");

    if let Err(e) = run_native_demo() {
        log::error!("Storage demo failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main
}

#[cfg(not(target_arch = "wasm32"))]
fn run_native_demo() -> Result<(), use_storage::StorageError> {
    use use_storage::{StorageOptions, StorageType, memory_area, use_storage};

    let toolbar = use_storage("theme", "light".to_string(), None)?;
    let sidebar = use_storage("theme", "light".to_string(), None)?;
    let _watch = sidebar.watch(|theme| log::info!("sidebar sees theme `{}`", theme));

    toolbar.set("dark".to_string())?;
    println!("after local set:   toolbar={} sidebar={}", toolbar.get(), sidebar.get());

    memory_area(StorageType::Local).apply_remote("theme", Some("\"solarized\""))?;
    println!("after remote set:  toolbar={} sidebar={}", toolbar.get(), sidebar.get());

    memory_area(StorageType::Local).apply_remote("theme", None)?;
    println!("after remote drop: toolbar={} sidebar={}", toolbar.get(), sidebar.get());

    let draft = use_storage(
        "draft",
        String::new(),
        Some(StorageOptions::new().storage_type(StorageType::Session)),
    )?;
    draft.set("unsent message".to_string())?;
    println!(
        "entries: session={} local={}",
        memory_area(StorageType::Session).len(),
        memory_area(StorageType::Local).len()
    );

    Ok(())
}

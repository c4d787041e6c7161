
mod config;
mod mode;
mod notify;
mod props;
mod state;
mod su;
mod user_config;
mod web;

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, RwLock},
    thread::sleep,
    time::{Duration, Instant},
};

use crate::{
    config::LOOP_TICK_MS,
    props::PropertyStore,
    state::{Selection, SharedState},
    su::SuShell,
    user_config::{load_or_init, write_config_atomic, UserConfig, CONFIG_PATH},
};

fn main() {
    println!("unleashed_manager starting");

    let cfg_path = PathBuf::from(CONFIG_PATH);
    let cfg = load_or_init(cfg_path.as_path());

    let store: Arc<dyn PropertyStore> = Arc::new(SuShell::new());

    // Initial read so the UI comes up with the real value.
    let persisted = props::read_mode(store.as_ref());
    match persisted.as_deref() {
        Some(v) => println!("PROP: current mode {}", v),
        None => println!("PROP: mode not set (assume {})", cfg.default_mode.as_str()),
    }

    let shared = {
        let mut s = SharedState::new(cfg);
        s.selection = Selection::from_persisted(persisted.as_deref(), s.config.default_mode);
        s.info.current_mode = persisted;
        Arc::new(RwLock::new(s))
    };

    web::spawn(shared.clone(), store.clone(), cfg_path.clone());

    // Main loop: reload config when the file changes, re-read the property
    // so external setprop calls show up in the UI.
    let mut last_mtime: Option<u64> = None;
    let mut last_refresh = Instant::now();

    loop {
        sleep(Duration::from_millis(LOOP_TICK_MS));

        let mtime = fs::metadata(&cfg_path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        if mtime.is_some() && mtime != last_mtime {
            // The first observation is the file load_or_init just wrote.
            if last_mtime.is_some() {
                let cfg = load_or_init(cfg_path.as_path());
                let mut s = shared.write().unwrap();
                s.config = cfg;
                s.config_rev = s.config_rev.wrapping_add(1);
                s.last_config_error = None;
                println!("CFG: reloaded (rev {})", s.config_rev);
            }
            last_mtime = mtime;
        } else if mtime.is_none() && last_mtime.is_some() {
            // Config was removed; recreate defaults.
            let def = UserConfig::default();
            let _ = write_config_atomic(cfg_path.as_path(), &def);
            {
                let mut s = shared.write().unwrap();
                s.config = def;
                s.config_rev = s.config_rev.wrapping_add(1);
                s.last_config_error = Some("config missing: reset to default".to_string());
            }
            last_mtime = None;
        }

        let refresh_secs = { shared.read().unwrap().config.refresh_secs };
        if last_refresh.elapsed() >= Duration::from_secs(refresh_secs) {
            last_refresh = Instant::now();

            let value = props::read_mode(store.as_ref());
            let mut s = shared.write().unwrap();
            if value != s.info.current_mode {
                println!("PROP: mode is now {}", value.as_deref().unwrap_or("<unset>"));
                // Untouched selections follow the outside world.
                if !s.selection.touched() {
                    s.selection =
                        Selection::from_persisted(value.as_deref(), s.config.default_mode);
                }
                s.info.current_mode = value;
            }
        }
    }
}

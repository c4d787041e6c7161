use crate::{
    config::APPLY_HINT_SECS,
    mode::Mode,
    notify::post_notification,
    props::{self, PropertyStore},
    state::SharedState,
    user_config,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    thread,
};
use tiny_http::{Header, Method, Response, Server, StatusCode};

const BIND_ADDR: &str = "127.0.0.1:1021";

const STYLE: &str = r#"
:root {
  --primary-color: #3a86ff;
  --primary-color-rgb: 58,134,255;
  --surface: #1e1e1e;
  --background: #0f1113;
  --text-primary: #f1f3f5;
  --text-secondary: #ced4da;
  --muted: #adb5bd;
  --border: #2a2a2a;
  --radius: 12px;
  --shadow: 0 6px 18px rgba(0,0,0,0.30);
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
  font-family: Inter, Segoe UI, Roboto, system-ui;
  background: var(--background);
  color: var(--text-primary);
  min-height: 100vh;
  line-height: 1.5;
  padding: 24px 16px;
  max-width: 560px;
  margin: 0 auto;
}

h1 { font-size: 1.4rem; letter-spacing: 0.2px; }
.subtitle { color: var(--muted); font-size: 0.95rem; margin-bottom: 18px; }

.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  box-shadow: var(--shadow);
  padding: 16px;
  margin-bottom: 14px;
}

.mode-card {
  display: flex; align-items: center; gap: 14px;
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 16px;
  margin-bottom: 10px;
  cursor: pointer;
  transition: border-color 150ms, background 150ms;
}
.mode-card:hover { background: rgba(var(--primary-color-rgb), 0.08); }
.mode-card.selected { border-color: var(--primary-color); background: rgba(var(--primary-color-rgb), 0.14); }
.mode-card input { accent-color: var(--primary-color); width: 18px; height: 18px; flex-shrink: 0; }
.mode-name { font-weight: 600; }
.mode-desc { color: var(--muted); font-size: 0.88rem; }

button {
  width: 100%;
  background: var(--primary-color);
  border: none;
  color: #fff;
  border-radius: 8px;
  padding: 16px;
  cursor: pointer;
  font-weight: 600;
  font-size: 1rem;
}
button:hover { filter: brightness(1.1); }

.kv { display:flex; justify-content:space-between; gap:10px; padding: 6px 0; }
.k { color: var(--muted); }
.v { font-family: ui-monospace, Menlo, Consolas, monospace; }

.hint { color: var(--muted); font-size: 0.90rem; margin-top: 10px; min-height: 1.2em; }
.err { color: #ff6b6b; font-size: 0.90rem; }

label { display:block; font-size: 0.80rem; letter-spacing: .08em; text-transform: uppercase; color: var(--muted); margin-bottom: 6px; }
select,input[type="number"] {
  background: transparent;
  color: var(--text-primary);
  border: 1px solid var(--border);
  border-radius: 8px;
  padding: 8px 10px;
  min-width: 130px;
}
.row { display:flex; gap:12px; flex-wrap:wrap; align-items:flex-end; }
h2 { font-size: 0.95rem; margin-bottom: 10px; color: var(--text-secondary); }
"#;

fn ok_html(s: String) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(s).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]).unwrap(),
    )
}

fn ok_json(v: Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(v.to_string())
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap())
}

fn bad(code: u16, msg: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(msg).with_status_code(StatusCode(code))
}

fn read_body(req: &mut tiny_http::Request) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = req.as_reader().read_to_end(&mut buf);
    buf
}

fn build_state_json(shared: &Arc<RwLock<SharedState>>) -> Value {
    let s = shared.read().unwrap();

    json!({
        "current_mode": s.info.current_mode,
        "selection": {
            "mode": s.selection.mode().as_str(),
            "changed": s.selection.touched(),
            "applied": s.selection.applied(),
        },
        "last_applied": s.info.last_applied.map(Mode::as_str),
        "last_apply_error": s.info.last_apply_error,
        "apply_hint_secs": APPLY_HINT_SECS,
        "config_rev": s.config_rev,
        "last_config_error": s.last_config_error,
        "cfg": {
            "default_mode": s.config.default_mode.as_str(),
            "refresh_secs": s.config.refresh_secs,
            "notifications": { "enabled": s.config.notifications.enabled },
        }
    })
}

fn mode_cards() -> String {
    let mut out = String::new();
    for mode in Mode::ALL {
        out.push_str(&format!(
            r#"<label class="mode-card" data-mode="{value}">
  <input type="radio" name="mode" value="{value}" />
  <div>
    <div class="mode-name">{label}</div>
    <div class="mode-desc">{desc}</div>
  </div>
</label>
"#,
            value = mode.as_str(),
            label = mode.label(),
            desc = mode.description(),
        ));
    }
    out
}

fn page_app() -> String {
    let html = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1,maximum-scale=5" />
  <title>Unleashed</title>
  <style>#STYLE#</style>
</head>
<body>
  <h1>CPU Mode</h1>
  <div class="subtitle">Unleashed manager</div>

  <div id="cards">
#CARDS#
  </div>

  <button id="apply">Apply Settings</button>
  <div class="hint" id="apply_msg"></div>
  <div class="err" id="apply_err"></div>

  <div class="card">
    <h2>Status</h2>
    <div class="kv"><div class="k">Persisted mode</div><div class="v" id="st_current">?</div></div>
    <div class="kv"><div class="k">Applied this session</div><div class="v" id="st_applied">?</div></div>
  </div>

  <div class="card">
    <h2>Settings</h2>
    <div class="row">
      <div>
        <label>Default mode</label>
        <select id="c_default">
          <option value="benchmark">benchmark</option>
          <option value="advertised">advertised</option>
          <option value="efficiency">efficiency</option>
        </select>
      </div>
      <div>
        <label>Refresh (s)</label>
        <input id="c_refresh" type="number" min="5" max="3600" value="30" />
      </div>
      <div>
        <label>Notifications</label>
        <select id="c_notif">
          <option value="true">ON</option>
          <option value="false">OFF</option>
        </select>
      </div>
    </div>
    <div class="hint" id="save_msg"></div>
    <div class="err" id="cfg_err"></div>
  </div>

<script>
const $ = (id)=>document.getElementById(id);

function highlight(){
  document.querySelectorAll('.mode-card').forEach(c=>{
    const input = c.querySelector('input');
    c.classList.toggle('selected', input.checked);
  });
}
document.querySelectorAll('.mode-card input').forEach(r=>{
  r.addEventListener('change', highlight);
});

function selectedMode(){
  const r = document.querySelector('.mode-card input:checked');
  return r ? r.value : null;
}

let applyMsgTimer = null;

$('apply').addEventListener('click', async ()=>{
  const mode = selectedMode();
  if(!mode) return;
  try{
    const r = await fetch('/api/apply', {
      method:'POST',
      headers:{'Content-Type':'application/json'},
      body: JSON.stringify({mode: mode})
    });
    const v = await r.json();
    $('apply_msg').textContent = v.hint || '';
    if(applyMsgTimer) clearTimeout(applyMsgTimer);
    applyMsgTimer = setTimeout(()=>{ $('apply_msg').textContent=''; }, 4000);
  }catch(e){
    $('apply_err').textContent = String(e);
  }
});

let seeded = false;
let lastCfgRev = -1;
let saveTimer = null;
let saving = false;

function applyCfg(cfg){
  if(!cfg) return;
  $('c_default').value = cfg.default_mode || 'advertised';
  $('c_refresh').value = Number(cfg.refresh_secs || 30);
  $('c_notif').value = (cfg.notifications && cfg.notifications.enabled) ? 'true' : 'false';
}

function scheduleSave(){
  if(saveTimer) clearTimeout(saveTimer);
  saveTimer = setTimeout(doSave, 450);
}

async function doSave(){
  if(saving) return;
  saving = true;
  $('save_msg').textContent = 'saving...';
  try{
    const payload = {
      default_mode: $('c_default').value,
      refresh_secs: Number($('c_refresh').value || 30),
      notifications: { enabled: $('c_notif').value === 'true' }
    };
    const r = await fetch('/api/config', { method:'POST', headers:{'Content-Type':'application/json'}, body: JSON.stringify(payload)});
    const t = await r.text();
    if(!r.ok){
      $('save_msg').textContent = 'error: ' + t;
    } else {
      $('save_msg').textContent = 'ok';
      setTimeout(()=>{ if($('save_msg').textContent==='ok') $('save_msg').textContent=''; }, 1000);
    }
  }catch(e){
    $('save_msg').textContent = 'error: ' + String(e);
  }
  saving = false;
}

['c_default','c_refresh','c_notif'].forEach(id=>{
  const el = $(id);
  el.addEventListener('change', scheduleSave);
  el.addEventListener('input', scheduleSave);
});

async function tick(){
  try{
    const r = await fetch('/api/state');
    const s = await r.json();

    $('st_current').textContent = s.current_mode || 'not set';
    $('st_applied').textContent = s.last_applied || 'no';
    $('apply_err').textContent = s.last_apply_error || '';
    $('cfg_err').textContent = s.last_config_error || '';

    if(!seeded && s.selection){
      const r = document.querySelector('.mode-card input[value="' + s.selection.mode + '"]');
      if(r){ r.checked = true; highlight(); }
      seeded = true;
    }

    if(s.config_rev !== lastCfgRev){
      lastCfgRev = s.config_rev;
      applyCfg(s.cfg);
    }
  }catch(e){
    // ignore
  }
}

tick();
setInterval(tick, 2000);
</script>
</body>
</html>"#;

    html.replace("#STYLE#", STYLE).replace("#CARDS#", &mode_cards())
}

#[derive(Debug, Deserialize)]
struct ApplyPayload {
    mode: String,
}

/// The picker is the validation boundary: the property store accepts any
/// string, the UI only lets the three modes through.
fn handle_api_apply(
    shared: &Arc<RwLock<SharedState>>,
    store: &dyn PropertyStore,
    body: &[u8],
) -> Result<Value, String> {
    let payload: ApplyPayload = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let mode =
        Mode::parse(&payload.mode).ok_or_else(|| format!("unknown mode: {}", payload.mode))?;

    let hint = format!("Settings will take up to {} s to apply", APPLY_HINT_SECS);

    match props::write_mode(store, mode.as_str()) {
        Ok(()) => {
            let notify_enabled = {
                let mut s = shared.write().unwrap();
                s.selection.select(mode);
                s.selection.mark_applied();
                s.info.current_mode = Some(mode.as_str().to_string());
                s.info.last_applied = Some(mode);
                s.info.last_apply_error = None;
                s.config.notifications.enabled
            };
            println!("PROP: mode set to {}", mode.as_str());
            if notify_enabled {
                post_notification(&format!(
                    "CPU mode set to {} (takes effect within {} s)",
                    mode.label(),
                    APPLY_HINT_SECS
                ));
            }
            Ok(json!({ "ok": true, "hint": hint }))
        }
        Err(e) => {
            // The fixed hint goes back even when the write failed; the
            // error only lands in shared state and the state API.
            {
                let mut s = shared.write().unwrap();
                s.selection.select(mode);
                s.info.last_apply_error = Some(e.to_string());
            }
            eprintln!("PROP: set {} failed ({})", mode.as_str(), e);
            Ok(json!({ "ok": false, "hint": hint, "error": e.to_string() }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigPayload {
    default_mode: String,
    refresh_secs: u64,
    notifications: NotificationsPayload,
}

#[derive(Debug, Deserialize)]
struct NotificationsPayload {
    enabled: bool,
}

fn handle_api_config(
    shared: &Arc<RwLock<SharedState>>,
    cfg_path: &Path,
    body: &[u8],
) -> Result<(), String> {
    let payload: ConfigPayload = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let default_mode = Mode::parse(&payload.default_mode)
        .ok_or_else(|| format!("unknown mode: {}", payload.default_mode))?;

    let mut cfg = { shared.read().unwrap().config.clone() };
    cfg.default_mode = default_mode;
    cfg.refresh_secs = payload.refresh_secs;
    cfg.notifications.enabled = payload.notifications.enabled;

    user_config::apply_and_persist(shared, cfg_path, cfg)
}

pub fn spawn(shared: Arc<RwLock<SharedState>>, store: Arc<dyn PropertyStore>, cfg_path: PathBuf) {
    thread::spawn(move || {
        let server = match Server::http(BIND_ADDR) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("WEB: failed to bind {}: {}", BIND_ADDR, e);
                return;
            }
        };
        println!("WEB: http://{}", BIND_ADDR);

        for mut req in server.incoming_requests() {
            let url = req.url().to_string();
            let method = req.method().clone();

            let body = if matches!(method, Method::Post) {
                read_body(&mut req)
            } else {
                Vec::new()
            };

            let resp = match (method, url.as_str()) {
                (Method::Get, "/") => ok_html(page_app()),
                (Method::Get, "/api/state") => ok_json(build_state_json(&shared)),
                (Method::Post, "/api/apply") => {
                    match handle_api_apply(&shared, store.as_ref(), &body) {
                        Ok(v) => ok_json(v),
                        Err(e) => bad(400, &e),
                    }
                }
                (Method::Post, "/api/config") => {
                    match handle_api_config(&shared, &cfg_path, &body) {
                        Ok(_) => Response::from_string("ok"),
                        Err(e) => bad(400, &e),
                    }
                }
                _ => bad(404, "not found"),
            };

            let _ = req.respond(resp);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MODE_PROP,
        props::{InvocationError, MemoryStore},
        user_config::UserConfig,
    };
    use std::io;

    fn shared() -> Arc<RwLock<SharedState>> {
        let mut cfg = UserConfig::default();
        // Keep tests from shelling out for notifications.
        cfg.notifications.enabled = false;
        Arc::new(RwLock::new(SharedState::new(cfg)))
    }

    struct DownStore;

    impl PropertyStore for DownStore {
        fn read(&self, _key: &str) -> Result<Option<String>, InvocationError> {
            Err(InvocationError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "su: not found",
            )))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), InvocationError> {
            Err(InvocationError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "su: not found",
            )))
        }
    }

    #[test]
    fn page_lists_all_modes() {
        let page = page_app();
        for mode in Mode::ALL {
            assert!(page.contains(&format!(r#"value="{}""#, mode.as_str())));
            assert!(page.contains(mode.label()));
        }
    }

    #[test]
    fn apply_persists_and_marks_selection() {
        let shared = shared();
        let store = MemoryStore::new();

        let v = handle_api_apply(&shared, &store, br#"{"mode":"benchmark"}"#).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(store.read(MODE_PROP).unwrap().as_deref(), Some("benchmark"));

        let s = shared.read().unwrap();
        assert_eq!(s.selection.mode(), Mode::Benchmark);
        assert!(s.selection.applied());
        assert_eq!(s.info.current_mode.as_deref(), Some("benchmark"));
        assert_eq!(s.info.last_apply_error, None);
    }

    #[test]
    fn apply_rejects_out_of_set_modes() {
        let shared = shared();
        let store = MemoryStore::new();

        assert!(handle_api_apply(&shared, &store, br#"{"mode":"turbo"}"#).is_err());
        assert_eq!(store.read(MODE_PROP).unwrap(), None);
    }

    #[test]
    fn apply_records_store_failures_without_panicking() {
        let shared = shared();

        let v = handle_api_apply(&shared, &DownStore, br#"{"mode":"efficiency"}"#).unwrap();
        assert_eq!(v["ok"], false);

        let s = shared.read().unwrap();
        assert!(s.info.last_apply_error.is_some());
        assert_eq!(s.selection.mode(), Mode::Efficiency);
        assert!(!s.selection.applied());
    }

    #[test]
    fn config_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let shared = shared();

        handle_api_config(
            &shared,
            &path,
            br#"{"default_mode":"efficiency","refresh_secs":60,"notifications":{"enabled":false}}"#,
        )
        .unwrap();

        let s = shared.read().unwrap();
        assert_eq!(s.config.default_mode, Mode::Efficiency);
        assert_eq!(s.config.refresh_secs, 60);
        assert!(!s.config.notifications.enabled);
        assert_eq!(s.config_rev, 1);
    }

    #[test]
    fn config_save_rejects_unknown_default_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let shared = shared();

        assert!(handle_api_config(
            &shared,
            &path,
            br#"{"default_mode":"turbo","refresh_secs":60,"notifications":{"enabled":true}}"#,
        )
        .is_err());
        assert_eq!(shared.read().unwrap().config_rev, 0);
    }
}

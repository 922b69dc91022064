//! Script-driven rule engine.
//!
//! The user's rule script is compiled to an AST exactly once at startup;
//! compilation failure is fatal. Every evaluation then runs the whole script
//! top-to-bottom in a freshly built runtime -- sandbox isolation is per
//! evaluation, so a panicking or misbehaving evaluation cannot poison the
//! next one, and evaluations on different device threads never share script
//! state. Only the AST and the finalized watch set cross evaluations.
//!
//! Host API exposed to scripts:
//!   active_window_class() -> string
//!   send_keys(names)            consume the chord, emit a replacement
//!   on_key_press(names, action) rule primitive, set-equality match
//!   pressed_keys() -> array     snapshot as canonical names
//!   key_state(name) -> string   "down" / "up" against the snapshot
//!   print(...)                  routed to the log
//!
//! The fast path: the first evaluation records every chord the script
//! registers interest in. From then on a pressed set that is not in the
//! watch set skips script work entirely -- plain typing costs one hash
//! lookup per sync frame.

mod session;
mod watch;

use watch::ChordWatch;

use std::sync::{Arc, OnceLock};

use rhai::{Dynamic, FnPtr, NativeCallContext, AST};

use crate::cache::ChordCache;
use crate::error::Error;
use crate::keys::KeyCatalog;
use crate::output::VirtualOutput;
use crate::wininfo::FocusState;

use session::Session;

// Sandbox budget for one evaluation. Rule scripts are a screenful of
// declarations; anything beyond these limits is a runaway script.
const MAX_OPERATIONS: u64 = 500_000;
const MAX_CALL_LEVELS: usize = 64;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_STRING_SIZE: usize = 64 * 1024;
const MAX_ARRAY_SIZE: usize = 1024;

pub struct ScriptEngine {
    ast: AST,
    /// Watch set, published once after the first clean evaluation.
    watch: OnceLock<ChordWatch>,
    catalog: Arc<KeyCatalog>,
    cache: Arc<ChordCache>,
    output: Arc<VirtualOutput>,
    focus: Arc<FocusState>,
}

impl ScriptEngine {
    /// Compiles the rule script. Called once at startup.
    pub fn compile(
        script: &str,
        catalog: Arc<KeyCatalog>,
        cache: Arc<ChordCache>,
        output: Arc<VirtualOutput>,
        focus: Arc<FocusState>,
    ) -> Result<Self, Error> {
        let shell = rhai::Engine::new();
        let ast = shell
            .compile(script)
            .map_err(|e| Error::ScriptCompile(e.to_string()))?;
        Ok(Self {
            ast,
            watch: OnceLock::new(),
            catalog,
            cache,
            output,
            focus,
        })
    }

    /// Fast-path gate: does this pressed set warrant an evaluation?
    ///
    /// Always true until the watch set has been published by a first clean
    /// evaluation; afterwards a single set lookup.
    pub fn wants(&self, sorted_pressed: &[u16]) -> bool {
        match self.watch.get() {
            None => true,
            Some(watch) => watch.contains(sorted_pressed),
        }
    }

    /// Runs one evaluation against a pressed-set snapshot.
    ///
    /// `eager_held` lists the pass-through modifiers currently live on the
    /// output; the session's one-shot hook releases them before the first
    /// emission. Returns whether a rule consumed the chord. A script error
    /// is logged and reported as not-handled.
    pub fn evaluate(&self, sorted_pressed: &[u16], eager_held: &[u16]) -> bool {
        let recording = self.watch.get().is_none();
        let session = Arc::new(Session::new(
            sorted_pressed.to_vec(),
            eager_held.to_vec(),
            recording,
            self.catalog.clone(),
            self.cache.clone(),
            self.output.clone(),
            self.focus.clone(),
        ));

        let runtime = self.build_runtime(session.clone());
        match runtime.run_ast(&self.ast) {
            Ok(()) => {
                if recording {
                    let recorded = session.take_recorded();
                    log::debug!("engine: watch set finalized ({} chords)", recorded.len());
                    // A concurrent first evaluation may have won the race;
                    // both recorded the same script, so either copy is fine.
                    let _ = self.watch.set(recorded);
                }
                session.handled()
            }
            Err(e) => {
                log::error!("engine: script evaluation failed: {e}");
                false
            }
        }
    }

    /// Builds the per-evaluation runtime and wires the host functions to the
    /// session. Host calls with malformed arguments are logged and ignored,
    /// never raised into the script.
    fn build_runtime(&self, session: Arc<Session>) -> rhai::Engine {
        let mut engine = rhai::Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);

        engine.on_print(|text| log::info!("script: {text}"));
        engine.on_debug(|text, _source, pos| log::debug!("script: {pos:?}: {text}"));

        let s = session.clone();
        engine.register_fn("active_window_class", move || s.window_class());

        let s = session.clone();
        engine.register_fn("pressed_keys", move || -> rhai::Array {
            s.pressed_names().into_iter().map(Dynamic::from).collect()
        });

        let s = session.clone();
        engine.register_fn("key_state", move |name: &str| s.key_state(name).to_owned());

        let s = session.clone();
        engine.register_fn("send_keys", move |names: Dynamic| match as_string_list(&names) {
            Some(names) => s.send_keys(&names),
            None => log::warn!("engine: send_keys expects an array of key names"),
        });

        let s = session;
        engine.register_fn(
            "on_key_press",
            move |ctx: NativeCallContext,
                  names: Dynamic,
                  action: Dynamic|
                  -> Result<(), Box<rhai::EvalAltResult>> {
                let Some(names) = as_string_list(&names) else {
                    log::warn!("engine: on_key_press expects an array of key names");
                    return Ok(());
                };
                let Some(action) = action.try_cast::<FnPtr>() else {
                    log::warn!("engine: on_key_press expects a callable action");
                    return Ok(());
                };
                if s.on_key_press(&names) {
                    action.call_within_context::<Dynamic>(&ctx, ())?;
                }
                Ok(())
            },
        );

        engine
    }
}

/// Extracts a list of strings from a script value; `None` on any shape
/// mismatch.
fn as_string_list(value: &Dynamic) -> Option<Vec<String>> {
    let array = value.clone().try_cast::<rhai::Array>()?;
    let mut out = Vec::with_capacity(array.len());
    for item in array {
        out.push(item.into_string().ok()?);
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use evdev::Key;

    use crate::event::{RawEvent, KEY_PRESSED, KEY_RELEASED};
    use crate::output::RecordingSink;
    use crate::wininfo::WinInfo;

    use super::*;

    fn sorted(mut codes: Vec<u16>) -> Vec<u16> {
        codes.sort_unstable();
        codes
    }

    fn fixture(
        script: &str,
        class: &str,
    ) -> (ScriptEngine, Arc<Mutex<Vec<RawEvent>>>) {
        let catalog = Arc::new(KeyCatalog::new());
        let cache = Arc::new(ChordCache::new(catalog.clone()));
        let (sink, log) = RecordingSink::new();
        let output = Arc::new(VirtualOutput::new(Box::new(sink)));
        let focus = Arc::new(FocusState::new());
        if !class.is_empty() {
            focus.update(WinInfo {
                title: String::new(),
                class: class.into(),
            });
        }
        let engine = ScriptEngine::compile(script, catalog, cache, output, focus).unwrap();
        (engine, log)
    }

    fn press(key: Key) -> RawEvent {
        RawEvent::key(key.code(), KEY_PRESSED)
    }

    fn release(key: Key) -> RawEvent {
        RawEvent::key(key.code(), KEY_RELEASED)
    }

    #[test]
    fn compile_error_is_fatal() {
        let catalog = Arc::new(KeyCatalog::new());
        let cache = Arc::new(ChordCache::new(catalog.clone()));
        let (sink, _log) = RecordingSink::new();
        let output = Arc::new(VirtualOutput::new(Box::new(sink)));
        let focus = Arc::new(FocusState::new());
        let err = ScriptEngine::compile("on_key_press(", catalog, cache, output, focus)
            .err()
            .unwrap();
        assert!(matches!(err, Error::ScriptCompile(_)));
    }

    #[test]
    fn empty_script_finalizes_an_empty_watch_set() {
        let (engine, log) = fixture("", "");
        let pressed = sorted(vec![Key::KEY_A.code()]);

        assert!(engine.wants(&pressed));
        assert!(!engine.evaluate(&pressed, &[]));
        // After the first evaluation every pressed set is rejected in O(1).
        assert!(!engine.wants(&pressed));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn matching_rule_releases_eager_modifiers_then_emits() {
        let (engine, log) = fixture(
            r#"on_key_press(["ctrl", "c"], || send_keys(["ctrl", "insert"]));"#,
            "",
        );
        let pressed = sorted(vec![Key::KEY_LEFTCTRL.code(), Key::KEY_C.code()]);

        assert!(engine.evaluate(&pressed, &[Key::KEY_LEFTCTRL.code()]));

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                // One-shot hook: undo the eager Ctrl pass-through.
                release(Key::KEY_LEFTCTRL),
                RawEvent::syn(),
                // Replacement chord, modifiers first.
                press(Key::KEY_LEFTCTRL),
                press(Key::KEY_INSERT),
                RawEvent::syn(),
                release(Key::KEY_LEFTCTRL),
                release(Key::KEY_INSERT),
                RawEvent::syn(),
            ]
        );
    }

    #[test]
    fn watch_set_records_rules_even_when_nothing_matches() {
        let (engine, _log) = fixture(
            r#"on_key_press(["ctrl", "c"], || send_keys(["ctrl", "insert"]));"#,
            "",
        );
        let ctrl_only = vec![Key::KEY_LEFTCTRL.code()];
        assert!(!engine.evaluate(&ctrl_only, &[]));

        let watched = sorted(vec![Key::KEY_LEFTCTRL.code(), Key::KEY_C.code()]);
        let unwatched = sorted(vec![Key::KEY_LEFTCTRL.code(), Key::KEY_X.code()]);
        assert!(engine.wants(&watched));
        assert!(!engine.wants(&unwatched));
        assert!(!engine.wants(&ctrl_only));
    }

    #[test]
    fn rule_matching_is_set_equality_not_containment() {
        let (engine, log) = fixture(
            r#"on_key_press(["ctrl", "c"], || send_keys(["ctrl", "insert"]));"#,
            "",
        );
        let with_shift = sorted(vec![
            Key::KEY_LEFTCTRL.code(),
            Key::KEY_LEFTSHIFT.code(),
            Key::KEY_C.code(),
        ]);
        assert!(!engine.evaluate(&with_shift, &[]));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn window_gated_rule_stays_unregistered_elsewhere() {
        let script = r#"
            if active_window_class() == "Firefox" {
                on_key_press(["alt", "h"], || send_keys(["left"]));
            }
        "#;
        let chord = sorted(vec![Key::KEY_LEFTALT.code(), Key::KEY_H.code()]);

        let (engine, log) = fixture(script, "Gedit");
        assert!(!engine.evaluate(&chord, &[]));
        assert!(!engine.wants(&chord));
        assert!(log.lock().unwrap().is_empty());

        let (engine, log) = fixture(script, "Firefox");
        assert!(engine.evaluate(&chord, &[]));
        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                press(Key::KEY_LEFT),
                RawEvent::syn(),
                release(Key::KEY_LEFT),
                RawEvent::syn(),
            ]
        );
    }

    #[test]
    fn script_error_is_not_handled_and_keeps_the_watch_open() {
        let (engine, _log) = fixture(
            r#"
                on_key_press(["ctrl", "c"], || send_keys(["ctrl", "insert"]));
                throw "boom";
            "#,
            "",
        );
        let pressed = sorted(vec![Key::KEY_A.code()]);
        assert!(!engine.evaluate(&pressed, &[]));
        // Watch was not finalized, so the next frame evaluates again.
        assert!(engine.wants(&pressed));
    }

    #[test]
    fn malformed_host_calls_are_rejected_without_failing_the_frame() {
        let (engine, log) = fixture(
            r#"
                send_keys(42);
                send_keys(["ctrl", 7]);
                on_key_press("ctrl", 1);
            "#,
            "",
        );
        assert!(!engine.evaluate(&[Key::KEY_A.code()], &[]));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn snapshot_is_visible_through_pressed_keys_and_key_state() {
        let (engine, log) = fixture(
            r#"
                if key_state("ctrl") == "down" && pressed_keys().len() == 2 {
                    send_keys(["a"]);
                }
            "#,
            "",
        );
        let pressed = sorted(vec![Key::KEY_LEFTCTRL.code(), Key::KEY_C.code()]);
        assert!(engine.evaluate(&pressed, &[]));
        assert!(!log.lock().unwrap().is_empty());
    }
}

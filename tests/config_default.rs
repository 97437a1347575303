// tests/config_default.rs
use startup_scorer::config::{ScoringConfig, ENV_CONFIG_PATH};
use std::{env, fs};

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var("GEMINI_API_KEY");

    // 1) Nothing at all → defaults, oracle disabled for lack of a key
    let cfg = ScoringConfig::load_default().unwrap();
    assert!(!cfg.enabled);
    assert_eq!(cfg.provider, "gemini");

    // 2) Fallback TOML in ./config/
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/scoring.toml"),
        "api_key = \"literal\"\nconcurrency = 8\n",
    )
    .unwrap();
    let cfg = ScoringConfig::load_default().unwrap();
    assert!(cfg.enabled);
    assert_eq!(cfg.concurrency, 8);

    // 3) Env path wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"enabled":false,"concurrency":2}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = ScoringConfig::load_default().unwrap();
    assert_eq!(cfg.concurrency, 2);

    // 4) Env path to nowhere is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.json").display().to_string());
    assert!(ScoringConfig::load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_api_key_is_resolved_by_provider() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("scoring.json");
    fs::write(&p, r#"{"provider":"openai","api_key":"ENV"}"#).unwrap();

    env::set_var("OPENAI_API_KEY", "sk-test");
    let cfg = ScoringConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.api_key, "sk-test");

    env::remove_var("OPENAI_API_KEY");
    assert!(ScoringConfig::load_from_file(&p).is_err());
}

//! Lua scripts run through EVAL.

/// Deletes the key if it holds `ARGV[1]`.
///
/// Returns 1 when deleted, 0 when the key does not exist, -1 when another
/// holder owns it.
pub const RELEASE_SCRIPT_LUA: &str = r#"
    local current = redis.call('get', KEYS[1])
    if not current then
        return 0
    end
    if current == ARGV[1] then
        redis.call('del', KEYS[1])
        return 1
    end
    return -1
"#;

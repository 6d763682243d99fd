use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

pub fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing env: {name}"))
}

pub fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn socket_addr_from_env(name: &str, default: &str) -> Result<SocketAddr> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    SocketAddr::from_str(&value).map_err(|err| anyhow!("invalid socket addr for {name}: {err}"))
}

/// Reads `name` and parses it, falling back to `default` when unset.
/// A value that is set but unparsable is an error rather than a silent default.
pub fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow!("invalid value for {name}: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.key);
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        env::set_var(key, value);
        EnvGuard { key }
    }

    #[test]
    fn required_env_reads_value() {
        let _guard = set_env("CQ_TEST_REQUIRED_ENV_PRESENT", "value");
        let value = required_env("CQ_TEST_REQUIRED_ENV_PRESENT").unwrap();
        assert_eq!(value, "value");
    }

    #[test]
    fn required_env_missing_returns_error() {
        env::remove_var("CQ_TEST_REQUIRED_ENV_MISSING");
        assert!(required_env("CQ_TEST_REQUIRED_ENV_MISSING").is_err());
    }

    #[test]
    fn optional_env_treats_blank_as_unset() {
        let _guard = set_env("CQ_TEST_OPTIONAL_BLANK", "   ");
        assert_eq!(optional_env("CQ_TEST_OPTIONAL_BLANK"), None);
    }

    #[test]
    fn socket_addr_from_env_uses_default() {
        env::remove_var("CQ_TEST_SOCKET_DEFAULT");
        let addr = socket_addr_from_env("CQ_TEST_SOCKET_DEFAULT", "127.0.0.1:1234").unwrap();
        assert_eq!(addr, "127.0.0.1:1234".parse().unwrap());
    }

    #[test]
    fn socket_addr_from_env_parses_override() {
        let _guard = set_env("CQ_TEST_SOCKET_OVERRIDE", "0.0.0.0:4321");
        let addr = socket_addr_from_env("CQ_TEST_SOCKET_OVERRIDE", "127.0.0.1:1234").unwrap();
        assert_eq!(addr, "0.0.0.0:4321".parse().unwrap());
    }

    #[test]
    fn socket_addr_from_env_invalid_returns_error() {
        let _guard = set_env("CQ_TEST_SOCKET_INVALID", "not-a-socket");
        assert!(socket_addr_from_env("CQ_TEST_SOCKET_INVALID", "127.0.0.1:1234").is_err());
    }

    #[test]
    fn env_or_falls_back_and_parses() {
        env::remove_var("CQ_TEST_ENV_OR_UNSET");
        assert_eq!(env_or("CQ_TEST_ENV_OR_UNSET", 10u32).unwrap(), 10);

        let _guard = set_env("CQ_TEST_ENV_OR_SET", "42");
        assert_eq!(env_or("CQ_TEST_ENV_OR_SET", 10u32).unwrap(), 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        let _guard = set_env("CQ_TEST_ENV_OR_BAD", "ten");
        assert!(env_or("CQ_TEST_ENV_OR_BAD", 10u32).is_err());
    }
}

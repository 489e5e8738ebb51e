//! Global flags shared by every subcommand
//!
//! Each flag falls back to a `TACKLE_*` environment variable, then to the
//! library default.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tackle_apply::{ApplyOptions, CrdGate, TemplateValues};
use tackle_common::telemetry::{LogFormat, TelemetryConfig};
use tackle_common::{operator_image, OPERATOR_IMAGE_ENV, TACKLE_SYSTEM_NAMESPACE};
use tackle_components::ComponentSettings;

/// Poll interval for the CRD `Established` gate
const CRD_GATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection, templating and timing flags
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to kubeconfig (defaults to in-cluster or ~/.kube/config)
    #[arg(long, global = true, env = "TACKLE_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace for operator-managed add-on resources
    #[arg(short = 'n', long, global = true, env = "TACKLE_NAMESPACE", default_value = TACKLE_SYSTEM_NAMESPACE)]
    pub namespace: String,

    /// Operator image substituted into manifests
    #[arg(long, global = true, env = OPERATOR_IMAGE_ENV)]
    pub operator_image: Option<String>,

    /// Extra template value (`key=value`, repeatable), available as `values.<key>`
    #[arg(long = "set", global = true, value_parser = parse_key_value)]
    pub values: Vec<(String, String)>,

    /// Interval between readiness polls
    #[arg(long, global = true, env = "TACKLE_POLL_INTERVAL", default_value = "5s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Budget for each Deployment to become ready
    #[arg(long, global = true, env = "TACKLE_WAIT_TIMEOUT", default_value = "5m", value_parser = humantime::parse_duration)]
    pub wait_timeout: Duration,

    /// Budget for one whole install/uninstall/check of a component
    #[arg(long, global = true, env = "TACKLE_OPERATION_TIMEOUT", default_value = "60s", value_parser = humantime::parse_duration)]
    pub operation_timeout: Duration,

    /// Budget for applied CRDs to become Established before dependents are applied (0 disables)
    #[arg(long, global = true, env = "TACKLE_CRD_ESTABLISHED_TIMEOUT", default_value = "60s", value_parser = humantime::parse_duration)]
    pub crd_established_timeout: Duration,

    /// Log line format (text or json)
    #[arg(long, global = true, env = "TACKLE_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Component timing and apply behavior
    pub fn settings(&self) -> ComponentSettings {
        let apply = if self.crd_established_timeout.is_zero() {
            ApplyOptions::default()
        } else {
            ApplyOptions::with_crd_gate(CrdGate {
                poll_interval: CRD_GATE_POLL_INTERVAL,
                timeout: self.crd_established_timeout,
            })
        };

        ComponentSettings {
            poll_interval: self.poll_interval,
            wait_timeout: self.wait_timeout,
            operation_timeout: self.operation_timeout,
            apply,
        }
    }

    /// Values substituted into manifest templates
    pub fn template_values(&self) -> TemplateValues {
        TemplateValues {
            namespace: self.namespace.clone(),
            image: self.operator_image.clone().unwrap_or_else(operator_image),
            values: self.values.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }

    /// Tracing subscriber configuration
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            format: self.log_format,
            ..TelemetryConfig::default()
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        global: GlobalArgs,
    }

    fn parse(args: &[&str]) -> GlobalArgs {
        let mut argv = vec!["tackle"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let global = parse(&[]);
        let settings = global.settings();
        assert_eq!(settings.poll_interval, tackle_common::DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.wait_timeout, tackle_common::DEFAULT_WAIT_TIMEOUT);
        assert_eq!(settings.operation_timeout, tackle_common::DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(
            settings.apply.crd_gate.map(|g| g.timeout),
            Some(tackle_common::DEFAULT_CRD_ESTABLISHED_TIMEOUT)
        );
        assert_eq!(global.template_values().namespace, TACKLE_SYSTEM_NAMESPACE);
    }

    #[test]
    fn test_humane_durations_and_disabled_gate() {
        let global = parse(&[
            "--poll-interval",
            "250ms",
            "--wait-timeout",
            "2m",
            "--crd-established-timeout",
            "0s",
        ]);
        let settings = global.settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.wait_timeout, Duration::from_secs(120));
        assert_eq!(settings.apply.crd_gate, None);
    }

    #[test]
    fn test_template_values_from_flags() {
        let global = parse(&[
            "--namespace",
            "ops",
            "--operator-image",
            "registry.local/tackle:1.0",
            "--set",
            "replicas=2",
        ]);
        let values = global.template_values();
        assert_eq!(values.namespace, "ops");
        assert_eq!(values.image, "registry.local/tackle:1.0");
        assert_eq!(values.values.get("replicas").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_malformed_set_is_rejected() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
        assert_eq!(
            parse_key_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
    }
}

//! Registry generation and formatting seams.
//!
//! The concrete code-generation backend is an external collaborator; the
//! pipeline only knows the `RegistryGenerator` trait. `TsRegistryGenerator`
//! is the default backend used by the CLI: it emits one TypeScript module
//! carrying the full catalog. Formatting is likewise a trait with a
//! best-effort external-command implementation.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::fsutil::now_millis;
use crate::metadata::ContractMetadata;

/// The one line the idempotent write normalizes away.
pub const TIMESTAMP_PREFIX: &str = "// Generated at:";

/// Everything the generator backend receives.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratorInput {
    /// Sorted by contract name.
    pub contracts: Vec<ContractMetadata>,
    pub roles: BTreeMap<String, String>,
    pub resolver_keys: BTreeMap<String, String>,
    /// Base module name to paired variant name, when pairing is enabled.
    pub variants: BTreeMap<String, Option<String>>,
}

pub trait RegistryGenerator {
    fn generate(&self, input: &GeneratorInput) -> Result<String>;
}

/// Default backend: a TypeScript registry module.
#[derive(Debug, Default)]
pub struct TsRegistryGenerator;

impl RegistryGenerator for TsRegistryGenerator {
    fn generate(&self, input: &GeneratorInput) -> Result<String> {
        let mut out = String::new();
        out.push_str("// AUTO-GENERATED by facetgen. Do not edit by hand.\n");
        out.push_str(&format!("{TIMESTAMP_PREFIX} {}\n\n", now_millis()));

        let contracts = serde_json::to_string_pretty(&input.contracts)
            .context("Failed to serialize contract metadata")?;
        out.push_str(&format!(
            "export const contractRegistry = {contracts} as const;\n\n"
        ));

        let roles = serde_json::to_string_pretty(&input.roles)
            .context("Failed to serialize role table")?;
        out.push_str(&format!("export const roles = {roles} as const;\n\n"));

        let resolver_keys = serde_json::to_string_pretty(&input.resolver_keys)
            .context("Failed to serialize resolver-key table")?;
        out.push_str(&format!(
            "export const resolverKeys = {resolver_keys} as const;\n\n"
        ));

        let variants = serde_json::to_string_pretty(&input.variants)
            .context("Failed to serialize variant pairing")?;
        out.push_str(&format!(
            "export const timeTravelVariants = {variants} as const;\n"
        ));
        Ok(out)
    }
}

pub trait Formatter {
    fn format(&self, source: &str) -> Result<String>;
}

/// Leaves the text untouched.
#[derive(Debug, Default)]
pub struct NoopFormatter;

impl Formatter for NoopFormatter {
    fn format(&self, source: &str) -> Result<String> {
        Ok(source.to_string())
    }
}

/// Pipes the generated text through an external command's stdin/stdout.
#[derive(Debug)]
pub struct ExternalFormatter {
    command: Vec<String>,
}

impl ExternalFormatter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Formatter for ExternalFormatter {
    fn format(&self, source: &str) -> Result<String> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("Formatter command is empty");
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start formatter: {program}"))?;

        // Feed stdin from a separate thread while the parent drains stdout.
        // Writing everything before reading deadlocks once the child's
        // output outgrows the pipe buffer. The thread drops stdin when
        // done, signalling EOF.
        let mut stdin = child.stdin.take().context("Formatter stdin unavailable")?;
        let payload = source.as_bytes().to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .context("Failed to wait for formatter")?;
        match writer.join() {
            // A formatter that stopped reading early (broken pipe) already
            // committed to its output; the exit status decides below.
            Ok(_) => {}
            Err(_) => bail!("Formatter stdin writer panicked"),
        }
        if !output.status.success() {
            bail!("Formatter exited with status {:?}", output.status.code());
        }
        String::from_utf8(output.stdout).context("Formatter produced non-UTF-8 output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_text_is_stable_apart_from_timestamp() -> Result<()> {
        let input = GeneratorInput::default();
        let generator = TsRegistryGenerator;
        let a = generator.generate(&input)?;
        let b = generator.generate(&input)?;

        let strip = |text: &str| -> String {
            text.lines()
                .filter(|line| !line.starts_with(TIMESTAMP_PREFIX))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip(&a), strip(&b));
        assert!(a.contains("export const contractRegistry"));
        assert!(a.contains("export const timeTravelVariants"));
        Ok(())
    }

    #[test]
    fn noop_formatter_is_identity() -> Result<()> {
        let text = "export const x = 1;\n";
        assert_eq!(NoopFormatter.format(text)?, text);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn external_formatter_pipes_through_command() -> Result<()> {
        let formatter = ExternalFormatter::new(vec!["cat".to_string()]);
        assert_eq!(formatter.format("abc\n")?, "abc\n");

        let failing = ExternalFormatter::new(vec!["false".to_string()]);
        assert!(failing.format("abc").is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn external_formatter_handles_input_larger_than_pipe_buffer() -> Result<()> {
        // 1 MiB round-tripped through `cat`: both pipe buffers fill, so this
        // only completes when stdin is fed concurrently with draining stdout.
        let big = "registry line\n".repeat(75_000);
        let formatter = ExternalFormatter::new(vec!["cat".to_string()]);
        assert_eq!(formatter.format(&big)?, big);
        Ok(())
    }
}

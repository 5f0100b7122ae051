//! Host requirement checks

use std::cmp::Ordering;
use updkit_types::{RequirementKind, UpdateConfiguration, UpdateRequirement};

/// Versions the host reports for requirement checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Dotted OS version, `None` when it could not be determined
    pub os_version: Option<String>,
    /// Dotted runtime version of the host application framework
    pub runtime_version: Option<String>,
}

impl HostInfo {
    /// Probe the running OS version
    ///
    /// Runs `uname -r` on unix and `cmd /C ver` on Windows; failures leave the
    /// version unknown.
    pub async fn detect() -> Self {
        let output = if cfg!(windows) {
            tokio::process::Command::new("cmd")
                .args(["/C", "ver"])
                .output()
                .await
        } else {
            tokio::process::Command::new("uname")
                .arg("-r")
                .output()
                .await
        };

        let os_version = output
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| extract_dotted(&String::from_utf8_lossy(&out.stdout)));

        Self {
            os_version,
            runtime_version: None,
        }
    }

    #[must_use]
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }
}

/// Whether the operating system is 64-bit
///
/// On Windows the processor architecture variables are consulted, so a
/// 32-bit build running under WOW64 still reports a 64-bit OS. Other
/// platforms, and Windows without those variables, fall back to the
/// architecture this binary was built for.
#[must_use]
pub fn host_is_64bit() -> bool {
    os_is_64bit(std::env::consts::OS, std::env::consts::ARCH, |name| {
        std::env::var(name).ok()
    })
}

fn os_is_64bit(os: &str, target_arch: &str, env: impl Fn(&str) -> Option<String>) -> bool {
    if os == "windows" {
        // Set only for 32-bit processes on a 64-bit OS
        if let Some(arch) = env("PROCESSOR_ARCHITEW6432").or_else(|| env("PROCESSOR_ARCHITECTURE"))
        {
            return matches!(
                arch.to_ascii_uppercase().as_str(),
                "AMD64" | "ARM64" | "IA64"
            );
        }
    }
    matches!(
        target_arch,
        "x86_64" | "aarch64" | "powerpc64" | "mips64" | "riscv64" | "s390x" | "sparc64"
            | "loongarch64"
    )
}

/// Requirements of `config` the host does not satisfy
///
/// A requirement whose host version is unknown is treated as met.
#[must_use]
pub fn unmet_requirements(config: &UpdateConfiguration, host: &HostInfo) -> Vec<UpdateRequirement> {
    config
        .requirements
        .iter()
        .filter(|requirement| {
            let reported = match requirement.kind {
                RequirementKind::OsVersion => host.os_version.as_deref(),
                RequirementKind::Runtime => host.runtime_version.as_deref(),
            };
            reported.is_some_and(|have| compare_dotted(have, &requirement.version) == Ordering::Less)
        })
        .cloned()
        .collect()
}

/// Compare dotted numeric versions component-wise, padding with zeros
///
/// Non-numeric tails of a component (`1025-azure`) are ignored.
#[must_use]
pub fn compare_dotted(a: &str, b: &str) -> Ordering {
    let a = components(a);
    let b = components(b);
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

fn extract_dotted(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|token| token.trim_matches('.'))
        .find(|token| token.contains('.') && token.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

//! `adb` access: command output parsers and the process-backed client.
//!
//! The parsers are plain functions over captured stdout so they can be
//! tested against real device transcripts without a phone attached.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use touchmap_core::Rotation;

use super::{DeviceError, EventStream, RotationProbe, StreamLauncher};

/// How long one-shot `adb` commands may take.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Serials of devices in the `device` state from `adb devices`.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next() == Some("device")).then(|| serial.to_string())
        })
        .collect()
}

/// A multi-touch input node from `getevent -pl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchNode {
    pub path: String,
    pub name: String,
    /// Maximum raw `ABS_MT_POSITION_X` / `_Y` values.
    pub max_x: i32,
    pub max_y: i32,
    /// Carries `INPUT_PROP_DIRECT` (a touchscreen rather than a touchpad).
    pub direct: bool,
}

/// Picks the touchscreen node from `getevent -pl` output.
///
/// Only nodes reporting `ABS_MT_POSITION_X` qualify; among those the first
/// one with `INPUT_PROP_DIRECT` wins, otherwise the first one listed.
pub fn parse_touch_node(output: &str) -> Option<TouchNode> {
    let mut nodes: Vec<TouchNode> = Vec::new();
    let mut current: Option<(TouchNode, bool)> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("add device") {
            if let Some((node, has_mt)) = current.take() {
                if has_mt {
                    nodes.push(node);
                }
            }
            let path = rest.rsplit(' ').next().unwrap_or_default().to_string();
            current = Some((
                TouchNode {
                    path,
                    name: String::new(),
                    max_x: 0,
                    max_y: 0,
                    direct: false,
                },
                false,
            ));
            continue;
        }
        let Some((node, has_mt)) = current.as_mut() else {
            continue;
        };
        if let Some(name) = trimmed.strip_prefix("name:") {
            node.name = name.trim().trim_matches('"').to_string();
        } else if trimmed.contains("ABS_MT_POSITION_X") {
            *has_mt = true;
            node.max_x = parse_max(trimmed).unwrap_or(0);
        } else if trimmed.contains("ABS_MT_POSITION_Y") {
            node.max_y = parse_max(trimmed).unwrap_or(0);
        } else if trimmed == "INPUT_PROP_DIRECT" {
            node.direct = true;
        }
    }
    if let Some((node, true)) = current {
        nodes.push(node);
    }

    let first_direct = nodes.iter().position(|n| n.direct);
    match first_direct {
        Some(i) => Some(nodes.swap_remove(i)),
        None => nodes.into_iter().next(),
    }
}

fn parse_max(line: &str) -> Option<i32> {
    line.split(',')
        .map(str::trim)
        .find_map(|field| field.strip_prefix("max "))
        .and_then(|v| v.trim().parse().ok())
}

/// Natural resolution from `wm size`.  `Physical size` is preferred over an
/// `Override size`.
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let pick = |prefix: &str| {
        output.lines().find_map(|line| {
            let (w, h) = line.trim().strip_prefix(prefix)?.trim().split_once('x')?;
            Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
        })
    };
    pick("Physical size:").or_else(|| pick("Override size:"))
}

/// Density from `wm density`.
pub fn parse_wm_density(output: &str) -> Option<u32> {
    let pick = |prefix: &str| {
        output
            .lines()
            .find_map(|line| line.trim().strip_prefix(prefix)?.trim().parse().ok())
    };
    pick("Override density:").or_else(|| pick("Physical density:"))
}

/// Current display rotation from `dumpsys display`.
pub fn parse_rotation(output: &str) -> Option<Rotation> {
    const KEY: &str = "mCurrentOrientation=";
    let start = output.find(KEY)? + KEY.len();
    let digit = output[start..].chars().next()?.to_digit(10)?;
    (digit < 4).then(|| Rotation::from_index(digit as u8))
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Everything learned about the device at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub serial: String,
    pub node: TouchNode,
    pub natural_res: (u32, u32),
    pub dpi: u32,
    pub rotation: Rotation,
}

/// Runs `adb` against one device.
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb: String,
    serial: String,
}

impl AdbClient {
    /// Picks the device to talk to: `preferred` if given, otherwise the only
    /// (or first) attached device.
    pub async fn discover(adb: &str, preferred: Option<&str>) -> Result<Self, DeviceError> {
        let output = run(adb, &["devices"]).await?;
        let serials = parse_devices(&output);
        let serial = match preferred {
            Some(wanted) => serials
                .iter()
                .find(|s| s.as_str() == wanted)
                .cloned()
                .ok_or_else(|| DeviceError::SerialNotFound(wanted.to_string()))?,
            None => serials.first().cloned().ok_or(DeviceError::NoDevice)?,
        };
        if serials.len() > 1 && preferred.is_none() {
            info!("{} devices attached; using {serial}", serials.len());
        }
        Ok(Self {
            adb: adb.to_string(),
            serial,
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Runs `adb -s <serial> shell <args...>` and returns stdout.
    pub async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = vec!["-s", self.serial.as_str(), "shell"];
        full.extend_from_slice(args);
        run(&self.adb, &full).await
    }

    /// Queries the touch node, resolution, density and rotation.
    pub async fn probe(&self) -> Result<DeviceInfo, DeviceError> {
        let listing = self.shell(&["getevent", "-pl"]).await?;
        let node = parse_touch_node(&listing).ok_or(DeviceError::NoTouchNode)?;
        debug!("touch node {} ({}) max {}x{}", node.path, node.name, node.max_x, node.max_y);

        let size = self.shell(&["wm", "size"]).await?;
        let natural_res = parse_wm_size(&size).ok_or_else(|| DeviceError::Unparseable {
            what: "display size",
            output: size.trim().to_string(),
        })?;
        let density = self.shell(&["wm", "density"]).await?;
        let dpi = parse_wm_density(&density).ok_or_else(|| DeviceError::Unparseable {
            what: "display density",
            output: density.trim().to_string(),
        })?;
        let rotation = self.rotation().await.unwrap_or(Rotation::Rot0);

        Ok(DeviceInfo {
            serial: self.serial.clone(),
            node,
            natural_res,
            dpi,
            rotation,
        })
    }

    pub async fn rotation(&self) -> Result<Rotation, DeviceError> {
        let output = self.shell(&["dumpsys", "display"]).await?;
        parse_rotation(&output).ok_or(DeviceError::Unparseable {
            what: "display rotation",
            output: String::from("dumpsys display"),
        })
    }

    /// Launcher that streams `getevent -l <node>` from this device.
    pub fn launcher(&self, node: &str) -> AdbLauncher {
        AdbLauncher {
            client: self.clone(),
            node: node.to_string(),
        }
    }
}

#[async_trait]
impl RotationProbe for AdbClient {
    async fn rotation(&self) -> Result<Rotation, DeviceError> {
        AdbClient::rotation(self).await
    }
}

async fn run(program: &str, args: &[&str]) -> Result<String, DeviceError> {
    let command_line = || format!("{program} {}", args.join(" "));
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(COMMAND_TIMEOUT, child)
        .await
        .map_err(|_| DeviceError::Timeout(command_line()))?
        .map_err(|source| DeviceError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(DeviceError::Command {
            command: command_line(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Spawns `adb shell getevent -l <node>` on demand.
#[derive(Debug, Clone)]
pub struct AdbLauncher {
    client: AdbClient,
    node: String,
}

#[async_trait]
impl StreamLauncher for AdbLauncher {
    async fn launch(&self) -> Result<Box<dyn EventStream>, DeviceError> {
        let mut child = Command::new(&self.client.adb)
            .args(["-s", self.client.serial.as_str(), "shell", "getevent", "-l", self.node.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeviceError::Spawn {
                program: self.client.adb.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| DeviceError::Command {
            command: format!("getevent -l {}", self.node),
            stderr: "stdout was not captured".into(),
        })?;
        Ok(Box::new(AdbEventStream {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

/// Line stream of a running `getevent`.  Dropping it kills the child.
struct AdbEventStream {
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl EventStream for AdbEventStream {
    async fn next_line(&mut self) -> Result<Option<String>, DeviceError> {
        self.lines.next_line().await.map_err(DeviceError::Read)
    }
}

//! Sensor backend reading `/sys/class/hwmon`.
//!
//! Every `hwmon*` directory is one chip. Attribute files are named
//! `<type><channel>_<item>` (`temp1_input`, `fan2_min`, ...) and grouped into
//! features. Chip names follow the libsensors `prefix-bus-address` form so the
//! exported `chip` and `adaptor` labels match what `sensors` prints.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::lmsensors::{
    Chip, FatalError, Feature, FeatureError, SensorBackend, SubFeature, ValueSource,
};

/// Default sysfs location of hwmon devices.
pub const DEFAULT_HWMON_PATH: &str = "/sys/class/hwmon";

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+)(\d+)_([a-z0-9_]+)$").expect("hwmon attribute pattern is valid")
});

/// Feature types in the order `sensors` lists them.
const TYPE_ORDER: [&str; 7] = ["in", "fan", "temp", "power", "energy", "curr", "humidity"];

/// Reads one sysfs attribute and scales it to the exported unit.
#[derive(Debug)]
struct SysfsValue {
    path: PathBuf,
    divisor: f64,
}

impl ValueSource for SysfsValue {
    fn read(&self) -> Result<f64, FeatureError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| FeatureError::Read {
            path: self.path.clone(),
            source,
        })?;
        let raw = raw.trim();
        let value: f64 = raw.parse().map_err(|_| FeatureError::InvalidValue {
            path: self.path.clone(),
            raw: raw.to_string(),
        })?;
        Ok(value / self.divisor)
    }
}

/// hwmon exports millivolts, millidegrees, milliamperes and microwatts.
fn divisor(kind: &str, item: &str) -> f64 {
    let flag = matches!(
        item,
        "alarm" | "beep" | "fault" | "type" | "enable" | "div" | "pulses"
    ) || item.ends_with("_alarm");
    if flag {
        return 1.0;
    }
    match kind {
        "in" | "temp" | "curr" | "humidity" => 1_000.0,
        "power" | "energy" => 1_000_000.0,
        _ => 1.0,
    }
}

/// Main readings sort first: the feature value is its first sub-measurement.
fn item_rank(item: &str) -> u8 {
    match item {
        "input" => 0,
        "average" => 1,
        _ => 2,
    }
}

fn type_rank(kind: &str) -> usize {
    TYPE_ORDER
        .iter()
        .position(|t| *t == kind)
        .unwrap_or(TYPE_ORDER.len())
}

/// [`SensorBackend`] over the kernel's hwmon sysfs interface.
#[derive(Debug, Clone)]
pub struct HwmonBackend {
    root: PathBuf,
}

impl Default for HwmonBackend {
    fn default() -> Self {
        Self::new(DEFAULT_HWMON_PATH)
    }
}

impl HwmonBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SensorBackend for HwmonBackend {
    fn initialize(&mut self) -> Result<(), FatalError> {
        let entries = fs::read_dir(&self.root).map_err(|source| FatalError::SourceUnavailable {
            path: self.root.clone(),
            source,
        })?;
        let count = entries.flatten().count();
        if count == 0 {
            warn!("No hwmon devices found under {}", self.root.display());
        } else {
            info!("Found {} hwmon devices under {}", count, self.root.display());
        }
        Ok(())
    }

    fn list_chips(&self) -> Vec<Chip> {
        match read_chips(&self.root) {
            Ok(chips) => chips,
            Err(e) => {
                warn!("Failed to enumerate {}: {}", self.root.display(), e);
                Vec::new()
            }
        }
    }

    fn check_source(&self) -> io::Result<()> {
        fs::read_dir(&self.root).map(|_| ())
    }

    fn teardown(&mut self) {
        debug!("Releasing hwmon backend at {}", self.root.display());
    }
}

/// Reads all chips, ordered by hwmon index.
fn read_chips(root: &Path) -> io::Result<Vec<Chip>> {
    let mut dirs: Vec<(u32, PathBuf)> = fs::read_dir(root)?
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = name.strip_prefix("hwmon")?.parse().ok()?;
            Some((index, entry.path()))
        })
        .collect();
    dirs.sort_by_key(|(index, _)| *index);

    Ok(dirs
        .into_iter()
        .filter_map(|(_, path)| read_chip(&path))
        .collect())
}

fn read_chip(hwmon_dir: &Path) -> Option<Chip> {
    // Older drivers keep their attributes on the parent device.
    let attr_dir = if has_attributes(hwmon_dir) {
        hwmon_dir.to_path_buf()
    } else {
        hwmon_dir.join("device")
    };

    let Some(prefix) =
        read_trimmed(&hwmon_dir.join("name")).or_else(|| read_trimmed(&attr_dir.join("name")))
    else {
        debug!("Skipping {}: no chip name", hwmon_dir.display());
        return None;
    };

    let (identity, adapter) = chip_identity(hwmon_dir, &prefix);
    Some(Chip {
        identity,
        adapter,
        features: read_features(&attr_dir),
    })
}

fn has_attributes(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| ATTRIBUTE.is_match(&e.file_name().to_string_lossy()))
        })
        .unwrap_or(false)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

type FeatureKey = (String, u32);

fn read_features(dir: &Path) -> Vec<Feature> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut items: HashMap<FeatureKey, Vec<(String, PathBuf)>> = HashMap::new();
    let mut labels: HashMap<FeatureKey, PathBuf> = HashMap::new();

    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(caps) = ATTRIBUTE.captures(&file_name) else {
            continue;
        };
        let Ok(channel) = caps[2].parse::<u32>() else {
            continue;
        };
        let key = (caps[1].to_string(), channel);
        let item = caps[3].to_string();

        if item == "label" {
            labels.insert(key, entry.path());
        } else {
            items.entry(key).or_default().push((item, entry.path()));
        }
    }

    let mut keys: Vec<FeatureKey> = items.keys().cloned().collect();
    keys.sort_by(|a, b| {
        type_rank(&a.0)
            .cmp(&type_rank(&b.0))
            .then_with(|| a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    let mut features = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(mut attrs) = items.remove(&key) else {
            continue;
        };
        // Without a main reading there is nothing to export.
        if !attrs.iter().any(|(item, _)| item_rank(item) < 2) {
            continue;
        }
        attrs.sort_by(|a, b| {
            item_rank(&a.0)
                .cmp(&item_rank(&b.0))
                .then_with(|| a.0.cmp(&b.0))
        });

        let (kind, channel) = key;
        let name = format!("{kind}{channel}");
        let label = labels
            .get(&(kind.clone(), channel))
            .and_then(|path| read_trimmed(path))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| name.clone());

        let subfeatures = attrs
            .into_iter()
            .map(|(item, path)| {
                let source = SysfsValue {
                    divisor: divisor(&kind, &item),
                    path,
                };
                SubFeature::new(format!("{name}_{item}"), source)
            })
            .collect();

        features.push(Feature {
            name,
            label,
            subfeatures,
        });
    }
    features
}

/// Builds the libsensors chip name and adapter name for a hwmon device.
fn chip_identity(hwmon_dir: &Path, prefix: &str) -> (String, String) {
    let Ok(device) = fs::canonicalize(hwmon_dir.join("device")) else {
        return virtual_chip(prefix);
    };
    bus_identity(&device, prefix)
        .or_else(|| {
            // Class devices such as nvme0 sit on top of the real bus device.
            let parent = fs::canonicalize(device.join("device")).ok()?;
            bus_identity(&parent, prefix)
        })
        .unwrap_or_else(|| virtual_chip(prefix))
}

fn virtual_chip(prefix: &str) -> (String, String) {
    (format!("{prefix}-virtual-0"), "Virtual device".to_string())
}

fn subsystem(device: &Path) -> Option<String> {
    let link = fs::read_link(device.join("subsystem")).ok()?;
    Some(link.file_name()?.to_string_lossy().into_owned())
}

fn bus_identity(device: &Path, prefix: &str) -> Option<(String, String)> {
    let dev_name = device.file_name()?.to_string_lossy().into_owned();
    match subsystem(device)?.as_str() {
        "i2c" => {
            let (bus, addr) = dev_name.split_once('-')?;
            let bus: u32 = bus.parse().ok()?;
            let addr = u32::from_str_radix(addr, 16).ok()?;
            let adapter = device
                .parent()
                .and_then(|adapter_dir| read_trimmed(&adapter_dir.join("name")))
                .unwrap_or_else(|| format!("i2c-{bus}"));
            Some((format!("{prefix}-i2c-{bus}-{addr:02x}"), adapter))
        }
        "pci" => {
            let addr = pci_address(&dev_name)?;
            Some((format!("{prefix}-pci-{addr:04x}"), "PCI adapter".to_string()))
        }
        "platform" | "of_platform" => {
            let addr = dev_name
                .rsplit_once('.')
                .and_then(|(_, n)| n.parse::<u32>().ok())
                .unwrap_or(0);
            Some((format!("{prefix}-isa-{addr:04x}"), "ISA adapter".to_string()))
        }
        "acpi" => Some((format!("{prefix}-acpi-0"), "ACPI interface".to_string())),
        _ => None,
    }
}

/// `domain:bus:slot.function` packed the way libsensors does.
fn pci_address(dev_name: &str) -> Option<u32> {
    let mut parts = dev_name.split(':');
    let domain = u32::from_str_radix(parts.next()?, 16).ok()?;
    let bus = u32::from_str_radix(parts.next()?, 16).ok()?;
    let (slot, func) = parts.next()?.split_once('.')?;
    let slot = u32::from_str_radix(slot, 16).ok()?;
    let func = u32::from_str_radix(func, 16).ok()?;
    Some((domain << 16) + (bus << 8) + (slot << 3) + func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Creates a device directory registered on `bus` and links `hwmon` to it.
    fn attach_device(sys: &Path, hwmon: &Path, device: &str, bus: &str) {
        let device_dir = sys.join("devices").join(device);
        let bus_dir = sys.join("bus").join(bus);
        fs::create_dir_all(&device_dir).unwrap();
        fs::create_dir_all(&bus_dir).unwrap();
        symlink(&bus_dir, device_dir.join("subsystem")).unwrap();
        fs::create_dir_all(hwmon).unwrap();
        symlink(&device_dir, hwmon.join("device")).unwrap();
    }

    #[test]
    fn test_pci_address_packing() {
        assert_eq!(pci_address("0000:01:00.0"), Some(0x0100));
        assert_eq!(pci_address("0000:00:1f.3"), Some(0xfb));
        assert_eq!(pci_address("garbage"), None);
    }

    #[test]
    fn test_divisor_per_type() {
        assert_eq!(divisor("temp", "input"), 1_000.0);
        assert_eq!(divisor("in", "input"), 1_000.0);
        assert_eq!(divisor("power", "average"), 1_000_000.0);
        assert_eq!(divisor("fan", "input"), 1.0);
        assert_eq!(divisor("temp", "crit_alarm"), 1.0);
    }

    #[test]
    fn test_platform_chip_with_labels() {
        let sys = TempDir::new().unwrap();
        let hwmon = sys.path().join("class/hwmon/hwmon0");
        attach_device(sys.path(), &hwmon, "platform/nct6775.656", "platform");
        write(&hwmon.join("name"), "nct6775\n");
        write(&hwmon.join("in0_input"), "1016\n");
        write(&hwmon.join("in0_label"), "Vcore\n");
        write(&hwmon.join("fan1_input"), "1200\n");
        write(&hwmon.join("fan1_min"), "300\n");
        write(&hwmon.join("power1_average"), "15000000\n");
        write(&hwmon.join("intrusion0_alarm"), "0\n");

        let chips = read_chips(&sys.path().join("class/hwmon")).unwrap();
        assert_eq!(chips.len(), 1);
        let chip = &chips[0];
        assert_eq!(chip.identity, "nct6775-isa-0290");
        assert_eq!(chip.adapter, "ISA adapter");

        let names: Vec<&str> = chip.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["in0", "fan1", "power1"]);

        assert_eq!(chip.features[0].label, "Vcore");
        assert!((chip.features[0].value().unwrap() - 1.016).abs() < 1e-9);
        assert_eq!(chip.features[1].label, "fan1");
        assert_eq!(chip.features[1].subfeatures[0].name, "fan1_input");
        assert_eq!(chip.features[1].value().unwrap(), 1200.0);
        assert_eq!(chip.features[2].value().unwrap(), 15.0);
    }

    #[test]
    fn test_bus_naming() {
        let sys = TempDir::new().unwrap();
        let class = sys.path().join("class/hwmon");

        let i2c = class.join("hwmon1");
        attach_device(sys.path(), &i2c, "i2c-0/0-0048", "i2c");
        write(
            &sys.path().join("devices/i2c-0/name"),
            "SMBus I801 adapter at f000\n",
        );
        write(&i2c.join("name"), "lm75\n");
        write(&i2c.join("temp1_input"), "31500\n");

        let pci = class.join("hwmon2");
        attach_device(sys.path(), &pci, "pci0000:00/0000:01:00.0", "pci");
        write(&pci.join("name"), "amdgpu\n");
        write(&pci.join("temp1_input"), "52000\n");

        let virt = class.join("hwmon3");
        write(&virt.join("name"), "acpitz\n");
        write(&virt.join("temp1_input"), "27800\n");

        let chips = read_chips(&class).unwrap();
        let ids: Vec<(&str, &str)> = chips
            .iter()
            .map(|c| (c.identity.as_str(), c.adapter.as_str()))
            .collect();
        assert_eq!(
            ids,
            [
                ("lm75-i2c-0-48", "SMBus I801 adapter at f000"),
                ("amdgpu-pci-0100", "PCI adapter"),
                ("acpitz-virtual-0", "Virtual device"),
            ]
        );
    }

    #[test]
    fn test_main_reading_comes_first() {
        let sys = TempDir::new().unwrap();
        let hwmon = sys.path().join("hwmon0");
        write(&hwmon.join("name"), "coretemp\n");
        write(&hwmon.join("temp1_crit"), "100000\n");
        write(&hwmon.join("temp1_max"), "84000\n");
        write(&hwmon.join("temp1_input"), "45000\n");

        let chips = read_chips(sys.path()).unwrap();
        let sub: Vec<&str> = chips[0].features[0]
            .subfeatures
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(sub, ["temp1_input", "temp1_crit", "temp1_max"]);
        assert_eq!(chips[0].features[0].value().unwrap(), 45.0);
    }

    #[test]
    fn test_unreadable_value_is_a_feature_error() {
        let sys = TempDir::new().unwrap();
        let hwmon = sys.path().join("hwmon0");
        write(&hwmon.join("name"), "it8728\n");
        write(&hwmon.join("fan2_input"), "N/A\n");

        let chips = read_chips(sys.path()).unwrap();
        assert!(matches!(
            chips[0].features[0].value(),
            Err(FeatureError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_chip_without_name_is_skipped() {
        let sys = TempDir::new().unwrap();
        write(&sys.path().join("hwmon0/temp1_input"), "40000\n");
        write(&sys.path().join("not-hwmon/name"), "x\n");
        assert!(read_chips(sys.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let sys = TempDir::new().unwrap();
        let mut backend = HwmonBackend::new(sys.path().join("absent"));
        assert!(matches!(
            backend.initialize(),
            Err(FatalError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_root_removed_after_start_fails_check() {
        let sys = TempDir::new().unwrap();
        let root = sys.path().join("hwmon");
        write(&root.join("hwmon0/name"), "coretemp\n");
        let mut backend = HwmonBackend::new(&root);
        backend.initialize().unwrap();
        assert!(backend.check_source().is_ok());

        fs::remove_dir_all(&root).unwrap();
        assert!(backend.check_source().is_err());
        assert!(backend.list_chips().is_empty());
    }
}

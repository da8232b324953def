//! CPU and network option compilation
//!
//! Pure translation of config knobs into `qm create` options. Unset knobs
//! simply produce no option.

use crate::config::ConfigMapping;

/// Adapter model used for every template NIC
pub const NETWORK_MODEL: &str = "virtio";

/// Compile CPU options
///
/// `CPU_SOCKET` takes precedence over `CPU_SOCKETS`, and `CPU_NUMA` over
/// `CPU_NUM`.
pub fn cpu_args(config: &ConfigMapping) -> Vec<String> {
    let options = [
        ("--cpu", config.get("CPU")),
        ("--cores", config.get("CPU_CORES")),
        ("--sockets", config.get_first(&["CPU_SOCKET", "CPU_SOCKETS"])),
        ("--numa", config.get_first(&["CPU_NUMA", "CPU_NUM"])),
    ];

    options
        .into_iter()
        .filter_map(|(flag, value)| value.map(|v| [flag.to_string(), v.to_string()]))
        .flatten()
        .collect()
}

/// Compile the network option
///
/// Always yields `--net0` with the base adapter model, extended with
/// `bridge=` and `mtu=` clauses when set.
pub fn network_args(config: &ConfigMapping) -> Vec<String> {
    let mut descriptor = NETWORK_MODEL.to_string();
    if let Some(bridge) = config.get("BRIDGE") {
        descriptor.push_str(",bridge=");
        descriptor.push_str(bridge);
    }
    if let Some(mtu) = config.get("MTU") {
        descriptor.push_str(",mtu=");
        descriptor.push_str(mtu);
    }
    vec!["--net0".to_string(), descriptor]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> ConfigMapping {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_no_cpu_fields_gives_empty_vector() {
        assert!(cpu_args(&ConfigMapping::new()).is_empty());
        assert!(cpu_args(&mapping(&[("CPU", ""), ("VMID", "100")])).is_empty());
    }

    #[test]
    fn test_all_cpu_fields_in_order() {
        let config = mapping(&[
            ("CPU_NUMA", "1"),
            ("CPU", "host"),
            ("CPU_SOCKETS", "2"),
            ("CPU_CORES", "4"),
        ]);
        assert_eq!(
            cpu_args(&config),
            vec!["--cpu", "host", "--cores", "4", "--sockets", "2", "--numa", "1"]
        );
    }

    #[test]
    fn test_primary_key_wins_over_fallback() {
        let config = mapping(&[
            ("CPU_SOCKET", "1"),
            ("CPU_SOCKETS", "2"),
            ("CPU_NUMA", "0"),
            ("CPU_NUM", "1"),
        ]);
        assert_eq!(cpu_args(&config), vec!["--sockets", "1", "--numa", "0"]);

        let config = mapping(&[("CPU_NUM", "1")]);
        assert_eq!(cpu_args(&config), vec!["--numa", "1"]);
    }

    #[test]
    fn test_network_args() {
        assert_eq!(network_args(&ConfigMapping::new()), vec!["--net0", "virtio"]);
        assert_eq!(
            network_args(&mapping(&[("BRIDGE", "vmbr0")])),
            vec!["--net0", "virtio,bridge=vmbr0"]
        );
        assert_eq!(
            network_args(&mapping(&[("MTU", "1450"), ("BRIDGE", "vmbr1")])),
            vec!["--net0", "virtio,bridge=vmbr1,mtu=1450"]
        );
        assert_eq!(
            network_args(&mapping(&[("MTU", "9000")])),
            vec!["--net0", "virtio,mtu=9000"]
        );
    }
}

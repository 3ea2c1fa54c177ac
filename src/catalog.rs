//! Static tool catalog: the logical tools the portal fronts, the container
//! names each may be deployed under, and the display metadata served by
//! `/api/tools`.
//!
//! Candidate lists are priority ordered; the first name present in a
//! snapshot wins. The order encodes a deployment migration policy, so it
//! must never be re-sorted.

use serde::Serialize;

pub struct ToolBinding {
    pub tool: &'static str,
    pub candidates: &'static [&'static str],
}

pub const TOOL_BINDINGS: &[ToolBinding] = &[
    ToolBinding {
        tool: "velociraptor",
        candidates: &["velociraptor"],
    },
    ToolBinding {
        tool: "wazuh",
        candidates: &["wazuh", "wazuh-dashboard", "cyber-blue-test-wazuh.dashboard-1"],
    },
    ToolBinding {
        tool: "wazuh-dashboard",
        candidates: &["wazuh", "wazuh-dashboard", "cyber-blue-test-wazuh.dashboard-1"],
    },
    ToolBinding {
        tool: "misp",
        candidates: &["misp", "misp-core", "cyber-blue-test-misp-core-1"],
    },
    ToolBinding {
        tool: "cyberchef",
        candidates: &["cyber-blue-test-cyberchef-1", "cyberchef"],
    },
    ToolBinding {
        tool: "thehive",
        candidates: &["cyber-blue-test-thehive-1", "thehive"],
    },
    ToolBinding {
        tool: "cortex",
        candidates: &["cyber-blue-test-cortex-1", "cortex"],
    },
    ToolBinding {
        tool: "fleetdm",
        candidates: &["fleet-server", "cyber-blue-test-fleet-server-1"],
    },
    ToolBinding {
        tool: "arkime",
        candidates: &["arkime-test", "arkime", "cyber-blue-test-arkime-1"],
    },
    ToolBinding {
        tool: "caldera",
        candidates: &["caldera", "cyber-blue-test-caldera-1"],
    },
    ToolBinding {
        tool: "evebox",
        candidates: &["evebox", "cyber-blue-test-evebox-1"],
    },
    ToolBinding {
        tool: "wireshark",
        candidates: &["wireshark", "cyber-blue-test-wireshark-1"],
    },
    ToolBinding {
        tool: "mitre",
        candidates: &["mitre-navigator", "cyber-blue-test-mitre-navigator-1"],
    },
    ToolBinding {
        tool: "mitre-navigator",
        candidates: &["mitre-navigator", "cyber-blue-test-mitre-navigator-1"],
    },
    ToolBinding {
        tool: "portainer",
        candidates: &["portainer", "cyber-blue-test-portainer-1"],
    },
    ToolBinding {
        tool: "shuffle",
        candidates: &["shuffle-frontend", "cyber-blue-test-shuffle-frontend-1"],
    },
];

/// Display metadata for one tool, consumed by the dashboard only.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub port: u16,
    pub category: &'static str,
    #[serde(rename = "categoryName")]
    pub category_name: &'static str,
}

pub const TOOL_CATALOG: &[ToolInfo] = &[
    ToolInfo {
        name: "Velociraptor",
        description: "Digital Forensics and Incident Response platform for live endpoint forensics and threat hunting.",
        port: 7000,
        category: "dfir",
        category_name: "DFIR",
    },
    ToolInfo {
        name: "Wazuh Dashboard",
        description: "SIEM dashboard for log analysis, alerting, and security monitoring.",
        port: 7001,
        category: "siem",
        category_name: "SIEM",
    },
    ToolInfo {
        name: "Shuffle",
        description: "Security automation and orchestration platform for building and deploying security workflows.",
        port: 7002,
        category: "soar",
        category_name: "SOAR",
    },
    ToolInfo {
        name: "MISP",
        description: "Threat Intelligence Platform for sharing, storing, and correlating indicators of compromise.",
        port: 7003,
        category: "cti",
        category_name: "CTI",
    },
    ToolInfo {
        name: "CyberChef",
        description: "Cyber Swiss Army Knife for data analysis, encoding, decoding, and forensics operations.",
        port: 7004,
        category: "utility",
        category_name: "Utility",
    },
    ToolInfo {
        name: "TheHive",
        description: "Incident Response and Case Management platform for security operations teams.",
        port: 7005,
        category: "soar",
        category_name: "SOAR",
    },
    ToolInfo {
        name: "Cortex",
        description: "Automated threat analysis platform with analyzers for TheHive integration.",
        port: 7006,
        category: "soar",
        category_name: "SOAR",
    },
    ToolInfo {
        name: "FleetDM",
        description: "Osquery-based endpoint visibility and fleet management platform.",
        port: 7007,
        category: "management",
        category_name: "Management",
    },
    ToolInfo {
        name: "Arkime",
        description: "Full packet capture and session search engine for network analysis.",
        port: 7008,
        category: "ids",
        category_name: "IDS",
    },
    ToolInfo {
        name: "Caldera",
        description: "Automated adversary emulation platform for security testing and red team operations.",
        port: 7009,
        category: "attack-simulation",
        category_name: "Attack Simulation",
    },
    ToolInfo {
        name: "Evebox",
        description: "Web-based viewer for Suricata EVE JSON logs and alert management.",
        port: 7010,
        category: "ids",
        category_name: "IDS",
    },
    ToolInfo {
        name: "Wireshark",
        description: "Network protocol analyzer for deep packet inspection and network troubleshooting.",
        port: 7099,
        category: "utility",
        category_name: "Utility",
    },
    ToolInfo {
        name: "MITRE Navigator",
        description: "Interactive ATT&CK matrix for threat modeling and attack path visualization.",
        port: 7013,
        category: "cti",
        category_name: "CTI",
    },
    ToolInfo {
        name: "Portainer",
        description: "Web-based container management interface for Docker and Kubernetes.",
        port: 9443,
        category: "management",
        category_name: "Management",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_binding_has_candidates() {
        for binding in TOOL_BINDINGS {
            assert!(
                !binding.candidates.is_empty(),
                "tool {} has no candidate containers",
                binding.tool
            );
        }
    }

    #[test]
    fn test_tool_names_unique() {
        let mut names: Vec<_> = TOOL_BINDINGS.iter().map(|b| b.tool).collect();
        names.sort();
        let len = names.len();
        names.dedup();
        assert_eq!(names.len(), len);
    }
}

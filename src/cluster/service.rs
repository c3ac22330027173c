//! Builder for multi-port services fronting a benchmark target.

use std::collections::BTreeMap;

use super::{IpFamily, Protocol, ServicePort, ServiceSpec, ServiceType, SessionAffinity};

/// Label key used to tie services (and their selectors) to workloads.
pub const APP_LABEL: &str = "podbench";

/// Build a service exposing every `service port -> target port` pair once per
/// protocol. Port entries are named `<targetPort>-<protocol>` and emitted in
/// ascending service-port order.
pub fn multi_port_service(
    name: &str,
    ports: &BTreeMap<u16, u16>,
    selector: BTreeMap<String, String>,
    affinity: bool,
    service_type: ServiceType,
    ip_family: Option<IpFamily>,
    protocols: &[Protocol],
) -> ServiceSpec {
    let mut svc_ports = Vec::with_capacity(ports.len() * protocols.len());
    for (&port, &target_port) in ports {
        for &protocol in protocols {
            svc_ports.push(ServicePort {
                name: format!("{}-{}", target_port, protocol.as_str().to_lowercase()),
                port,
                target_port,
                protocol,
            });
        }
    }

    let labels = BTreeMap::from([
        (APP_LABEL.to_string(), name.to_string()),
        ("app".to_string(), name.to_string()),
    ]);

    ServiceSpec {
        name: name.to_string(),
        labels,
        selector,
        ports: svc_ports,
        service_type,
        session_affinity: if affinity {
            SessionAffinity::ClientIP
        } else {
            SessionAffinity::None
        },
        ip_families: ip_family.into_iter().collect(),
    }
}

/// Selector matching workloads labelled `podbench=<name>`.
pub fn selector_for(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}

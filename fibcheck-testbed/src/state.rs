//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use fibcheck_utils::ip::Ipv4NetworkExt;
use fibcheck_utils::telemetry::StatePath;

use crate::device::Master;

// Reads a state leaf. Returns `None` when the leaf isn't present.
pub(crate) fn get(master: &Master, path: &StatePath) -> Option<String> {
    let instance = master.instances.get(path.instance())?;

    match path {
        StatePath::InstanceType { .. } => {
            Some(instance.instance_type.to_string())
        }
        StatePath::StaticRoutePrefix {
            protocol_name,
            prefix,
            ..
        } => {
            let prefix = prefix.apply_mask();
            let route = instance.static_routes.get(&prefix)?;
            (route.protocol_name == *protocol_name)
                .then(|| prefix.to_string())
        }
        StatePath::AftIpv4EntryPrefix { prefix, .. } => {
            let prefix = prefix.apply_mask();
            instance.rib.fib.get(&prefix)?;
            Some(prefix.to_string())
        }
        StatePath::AftIpv4EntryOriginProtocol { prefix, .. } => {
            let entry = instance.rib.fib.get(&prefix.apply_mask())?;
            Some(entry.protocol.to_string())
        }
    }
}

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use fibcheck_utils::ip::Ipv4NetworkExt;
use fibcheck_utils::protocol::Protocol;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, NetworkInstanceType,
    StaticRouteCfg,
};
use fibcheck_utils::{Receiver, Responder, UnboundedReceiver, UnboundedSender};
use ipnetwork::Ipv4Network;
use tokio::sync::mpsc::WeakSender;
use tokio::time;
use tracing::debug;

use crate::Config;
use crate::api::Request;
use crate::ate::{self, Ate};
use crate::error::Error;
use crate::gribi::{self, GribiServer};
use crate::interface::Interfaces;
use crate::rib::{Rib, Route, RouteFlags};
use crate::state;

// Emulated DUT, along with the ATE attached to it.
pub struct Master {
    // Testbed configuration.
    pub config: Config,
    // Request Tx channel, used by the traffic engine.
    pub request_tx: WeakSender<Request>,
    // RIB update queue Tx channel.
    pub update_queue_tx: UnboundedSender<()>,
    // DUT interfaces.
    pub interfaces: Interfaces,
    // Network instances.
    pub instances: BTreeMap<String, NetworkInstance>,
    // gRIBI server.
    pub gribi: GribiServer,
    // Traffic generator.
    pub ate: Ate,
}

#[derive(Debug)]
pub struct NetworkInstance {
    pub name: String,
    pub instance_type: NetworkInstanceType,
    pub static_routes: BTreeMap<Ipv4Network, StaticRouteCfg>,
    pub rib: Rib,
}

// ===== impl Master =====

impl Master {
    pub(crate) fn new(
        config: Config,
        request_tx: WeakSender<Request>,
        update_queue_tx: UnboundedSender<()>,
    ) -> Master {
        let interfaces = Interfaces::new(config.ports.clone());
        Master {
            config,
            request_tx,
            update_queue_tx,
            interfaces,
            instances: Default::default(),
            gribi: Default::default(),
            ate: Default::default(),
        }
    }

    pub(crate) async fn run(
        &mut self,
        mut request_rx: Receiver<Request>,
        mut update_queue_rx: UnboundedReceiver<()>,
    ) {
        let fib_delay =
            Duration::from_millis(self.config.fib_programming_delay_ms);

        loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        // All testbed handles were dropped.
                        break;
                    };
                    self.process_request(request);
                }
                Some(_) = update_queue_rx.recv() => {
                    // Forwarding-plane programming latency.
                    time::sleep(fib_delay).await;
                    while update_queue_rx.try_recv().is_ok() {}

                    self.process_update_queues();
                }
            }
        }
    }

    fn process_request(&mut self, request: Request) {
        match request {
            Request::DutInterface { cfg, responder } => {
                respond(responder, self.dut_interface_configure(cfg));
            }
            Request::AteInterface { cfg, responder } => {
                respond(responder, self.ate_interface_configure(cfg));
            }
            Request::AteProtocols { enable, responder } => {
                self.ate.protocols_running = enable;
                debug!(%enable, "ATE protocols updated");
                respond(responder, Ok(()));
            }
            Request::InstanceReplace { cfg, responder } => {
                respond(responder, self.instance_replace(cfg));
            }
            Request::InstanceDelete { name, responder } => {
                respond(responder, self.instance_delete(&name));
            }
            Request::StaticRouteReplace { cfg, responder } => {
                respond(responder, self.static_route_replace(cfg));
            }
            Request::StaticRouteDelete {
                instance,
                prefix,
                responder,
            } => {
                let result = self.static_route_delete(&instance, prefix);
                respond(responder, result);
            }
            Request::GribiOpen { params, responder } => {
                let client_id = self.gribi.open(params);
                let _ = responder.send(client_id);
            }
            Request::GribiModify {
                client_id,
                ops,
                responder,
            } => {
                gribi::process_modify(self, client_id, ops, responder);
            }
            Request::GribiFlush {
                client_id,
                instance,
                responder,
            } => {
                let result = gribi::process_flush(self, client_id, &instance);
                respond(responder, result);
            }
            Request::GribiClose {
                client_id,
                responder,
            } => {
                respond(responder, gribi::process_close(self, client_id));
            }
            Request::Get { path, responder } => {
                let _ = responder.send(state::get(self, &path));
            }
            Request::FlowStart { flow, responder } => {
                respond(responder, ate::flow_start(self, flow));
            }
            Request::FlowStop { name, responder } => {
                respond(responder, ate::flow_stop(self, &name));
            }
            Request::FlowCounters { name, responder } => {
                respond(responder, ate::flow_counters(self, &name));
            }
            Request::FlowTick { name } => {
                ate::process_flow_tick(self, &name);
            }
        }
    }

    // Processes the update queues of all network instances.
    fn process_update_queues(&mut self) {
        for instance in self.instances.values_mut() {
            instance
                .rib
                .process_update_queue(&instance.name, &self.interfaces);
        }

        gribi::process_pending_acks(self);
    }

    fn dut_interface_configure(
        &mut self,
        cfg: DutInterfaceCfg,
    ) -> Result<(), Error> {
        if self.interfaces.configure(cfg)? {
            // Nexthop reachability might have changed.
            for instance in self.instances.values_mut() {
                instance.rib.update_queue_add_all();
            }
        }

        Ok(())
    }

    fn ate_interface_configure(
        &mut self,
        cfg: AteInterfaceCfg,
    ) -> Result<(), Error> {
        if !self.interfaces.has_port(&cfg.attrs.port) {
            return Err(Error::UnknownPort(cfg.attrs.port));
        }

        self.ate.interface_configure(cfg);
        Ok(())
    }

    // Returns the instance of type DEFAULT_INSTANCE, if configured.
    pub(crate) fn default_instance(&self) -> Option<&NetworkInstance> {
        self.instances.values().find(|instance| {
            instance.instance_type == NetworkInstanceType::Default
        })
    }

    fn instance_replace(
        &mut self,
        cfg: NetworkInstanceCfg,
    ) -> Result<(), Error> {
        // There can be only one default instance.
        if cfg.instance_type == NetworkInstanceType::Default {
            if let Some(instance) = self.default_instance() {
                if instance.name != cfg.name {
                    return Err(Error::DefaultInstanceExists(
                        instance.name.clone(),
                    ));
                }
            }
        }

        let update_queue_tx = &self.update_queue_tx;
        let instance =
            self.instances.entry(cfg.name.clone()).or_insert_with(|| {
                NetworkInstance {
                    name: cfg.name.clone(),
                    instance_type: cfg.instance_type,
                    static_routes: Default::default(),
                    rib: Rib::new(update_queue_tx.clone()),
                }
            });
        instance.instance_type = cfg.instance_type;
        debug!(
            name = %cfg.name,
            instance_type = %cfg.instance_type,
            description = ?cfg.description,
            "network instance updated"
        );

        Ok(())
    }

    fn instance_delete(&mut self, name: &str) -> Result<(), Error> {
        self.instances
            .remove(name)
            .ok_or_else(|| Error::UnknownInstance(name.to_owned()))?;
        self.gribi.tables.remove(name);
        debug!(%name, "network instance deleted");

        Ok(())
    }

    fn static_route_replace(
        &mut self,
        mut cfg: StaticRouteCfg,
    ) -> Result<(), Error> {
        let instance = self
            .instances
            .get_mut(&cfg.instance)
            .ok_or_else(|| Error::UnknownInstance(cfg.instance.clone()))?;
        cfg.prefix = cfg.prefix.apply_mask();

        // Replacing a route with identical data is a no-op.
        if instance.static_routes.get(&cfg.prefix) == Some(&cfg) {
            return Ok(());
        }

        let nexthops = cfg.next_hops.values().map(|addr| (*addr, 1)).collect();
        let route = Route::new(
            Protocol::STATIC,
            self.config.static_distance,
            None,
            None,
            nexthops,
            RouteFlags::empty(),
        );
        debug!(
            instance = %cfg.instance,
            prefix = %cfg.prefix,
            "static route updated"
        );
        instance.rib.route_add(cfg.prefix, route);
        instance.static_routes.insert(cfg.prefix, cfg);

        Ok(())
    }

    fn static_route_delete(
        &mut self,
        instance: &str,
        prefix: Ipv4Network,
    ) -> Result<(), Error> {
        let instance = self
            .instances
            .get_mut(instance)
            .ok_or_else(|| Error::UnknownInstance(instance.to_owned()))?;
        let prefix = prefix.apply_mask();
        if instance.static_routes.remove(&prefix).is_some() {
            debug!(instance = %instance.name, %prefix, "static route deleted");
            instance.rib.route_del(prefix, Protocol::STATIC);
        }

        Ok(())
    }

    // Forwards a packet received from the given ATE interface.
    //
    // Returns the name of the ATE interface the packet egresses to.
    pub(crate) fn forward(
        &self,
        src_intf: &str,
        dst: Ipv4Addr,
    ) -> Option<String> {
        // The ATE must resolve its gateway before sending anything.
        let src = self.ate.interfaces.get(src_intf)?;
        if !self.ate.protocols_running {
            return None;
        }
        let ingress = self.interfaces.get(&src.port)?;
        if !ingress.enabled || ingress.addr.ip() != src.gateway {
            return None;
        }

        // Route lookup. DUT interfaces aren't bound to any VRF, so traffic
        // is always forwarded by the default instance.
        let (port, neighbor) = match self.interfaces.connected(dst) {
            Some(iface) => (iface.port.clone(), dst),
            None => {
                let instance = self.default_instance()?;
                let (_, entry) = instance.rib.lookup(dst)?;
                let nh = entry.select(dst)?;
                (nh.port.clone(), nh.addr)
            }
        };

        // Neighbor resolution.
        self.ate
            .neighbor(&port, neighbor)
            .map(|iface| iface.name.clone())
    }
}

// ===== helper functions =====

fn respond<T>(
    responder: Responder<Result<T, Error>>,
    result: Result<T, Error>,
) {
    if let Err(error) = &result {
        error.log();
    }
    let _ = responder.send(result);
}

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::future::Future;

use chrono::Utc;
use fibcheck_utils::client::{
    ClientError, DeviceConfig, RoutingControl, Telemetry, Topology, Traffic,
};
use fibcheck_utils::gribi::{Ipv4Entry, NextHopEntry, NextHopGroupEntry};
use fibcheck_utils::telemetry::StatePath;
use fibcheck_utils::topology::{
    AteInterfaceCfg, DutInterfaceCfg, NetworkInstanceCfg, StaticRouteCfg,
};
use fibcheck_utils::traffic::FlowSpec;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span};

use crate::error::{Error, with_source};
use crate::installer::{self, RouteInstaller};
use crate::report::{Failure, Observation, RunReport};
use crate::scenario::Scenario;
use crate::traffic::TrafficValidator;
use crate::verifier::ConvergenceVerifier;

// Collaborators driven by the orchestrator.
//
// A single testbed usually implements all of them.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub topology: &'a dyn Topology,
    pub device: &'a dyn DeviceConfig,
    pub routing: &'a dyn RoutingControl,
    pub telemetry: &'a dyn Telemetry,
    pub traffic: &'a dyn Traffic,
}

// States of a verification run. Transitions are strictly sequential.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Unconfigured,
    Provisioned,
    StaticInstalled,
    StaticVerified,
    DynamicInstalled,
    DynamicVerified,
    TrafficValidated,
    TornDown,
}

// Sequences a verification run and tears it down.
pub struct Orchestrator<'a> {
    scenario: &'a Scenario,
    collaborators: Collaborators<'a>,
}

// Resources acquired by a run, released on teardown.
#[derive(Debug)]
struct Run {
    state: RunState,
    protocols_started: bool,
    instance_created: bool,
    static_installed: bool,
    installer: Option<RouteInstaller>,
    // Flow started but not yet stopped by the traffic validator.
    flow: Option<String>,
    observations: Vec<Observation>,
}

// ===== impl Collaborators =====

impl<'a> Collaborators<'a> {
    // Uses the same object for every collaborator.
    pub fn single<T>(testbed: &'a T) -> Collaborators<'a>
    where
        T: Topology + DeviceConfig + RoutingControl + Telemetry + Traffic,
    {
        Collaborators {
            topology: testbed,
            device: testbed,
            routing: testbed,
            telemetry: testbed,
            traffic: testbed,
        }
    }
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ===== impl RunState =====

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Unconfigured => write!(f, "unconfigured"),
            RunState::Provisioned => write!(f, "provisioned"),
            RunState::StaticInstalled => write!(f, "static-installed"),
            RunState::StaticVerified => write!(f, "static-verified"),
            RunState::DynamicInstalled => write!(f, "dynamic-installed"),
            RunState::DynamicVerified => write!(f, "dynamic-verified"),
            RunState::TrafficValidated => write!(f, "traffic-validated"),
            RunState::TornDown => write!(f, "torn-down"),
        }
    }
}

// ===== impl Orchestrator =====

impl<'a> Orchestrator<'a> {
    pub fn new(
        scenario: &'a Scenario,
        collaborators: Collaborators<'a>,
    ) -> Orchestrator<'a> {
        Orchestrator {
            scenario,
            collaborators,
        }
    }

    // Executes a verification run, tearing it down regardless of its
    // outcome.
    pub async fn run(&self, run_id: u32) -> RunReport {
        self.run_until(run_id, std::future::pending::<()>()).await
    }

    // Same as `run`, except that the run is interrupted as soon as the given
    // future completes. Interrupted runs are torn down as well.
    pub async fn run_until<F>(&self, run_id: u32, interrupt: F) -> RunReport
    where
        F: Future,
    {
        let span = info_span!("run", id = %run_id);
        async move {
            let started = Utc::now();
            let mut run = Run::default();

            info!("starting verification run");
            let result = tokio::select! {
                result = self.execute(&mut run) => result,
                _ = interrupt => Err(Error::Interrupted),
            };
            let failure = match result {
                Ok(()) => None,
                Err(error) => {
                    error.log();
                    Some(Failure::from(&error))
                }
            };
            let reached = run.state;

            let teardown_errors = self
                .teardown(&mut run)
                .await
                .iter()
                .map(with_source)
                .collect::<Vec<_>>();
            run.transition(RunState::TornDown);

            let report = RunReport {
                run: run_id,
                started,
                finished: Utc::now(),
                reached,
                final_state: run.state,
                failure,
                teardown_errors,
                observations: run.observations,
            };
            info!(passed = %report.passed(), %reached, "run finished");
            report
        }
        .instrument(span)
        .await
    }

    // Linear pipeline. The first failure short-circuits to teardown.
    async fn execute(&self, run: &mut Run) -> Result<(), Error> {
        self.provision(run).await?;
        run.transition(RunState::Provisioned);

        self.install_static(run).await?;
        run.transition(RunState::StaticInstalled);

        self.verify_static(run).await?;
        run.transition(RunState::StaticVerified);

        self.install_dynamic(run).await?;
        run.transition(RunState::DynamicInstalled);

        self.verify_dynamic(run).await?;
        run.transition(RunState::DynamicVerified);

        self.validate_traffic(run).await?;
        run.transition(RunState::TrafficValidated);

        Ok(())
    }

    async fn provision(&self, run: &mut Run) -> Result<(), Error> {
        let scenario = self.scenario;
        let topology = self.collaborators.topology;
        let enabled = scenario.deviations.interface_enabled.then_some(true);

        for link in &scenario.links {
            let cfg = DutInterfaceCfg::new(link.dut.clone(), enabled);
            topology.configure_dut_interface(cfg).await.map_err(|error| {
                Error::Provisioning {
                    step: format!("DUT interface {}", link.dut.name),
                    error,
                }
            })?;

            let cfg = AteInterfaceCfg::new(link.ate.clone(), link.dut.ipv4);
            topology.configure_ate_interface(cfg).await.map_err(|error| {
                Error::Provisioning {
                    step: format!("ATE interface {}", link.ate.name),
                    error,
                }
            })?;
        }

        topology
            .start_protocols()
            .await
            .map_err(|error| Error::Provisioning {
                step: "ATE protocols".to_owned(),
                error,
            })?;
        run.protocols_started = true;

        let cfg = NetworkInstanceCfg::new(
            scenario.instance.clone(),
            scenario.instance_type,
            scenario.instance_description.clone(),
        );
        self.collaborators
            .device
            .replace_network_instance(cfg)
            .await
            .map_err(|error| Error::Provisioning {
                step: format!("network instance {}", scenario.instance),
                error,
            })?;
        run.instance_created = true;

        let path = StatePath::instance_type(&scenario.instance);
        let expected = scenario.instance_type.to_string();
        let state = self
            .verifier()
            .await_state(&path, &expected, scenario.convergence.timeout())
            .await?;
        run.observe(RunState::Provisioned, path.to_string(), state.observed);

        Ok(())
    }

    async fn install_static(&self, run: &mut Run) -> Result<(), Error> {
        let scenario = self.scenario;
        let cfg = StaticRouteCfg::single(
            &scenario.instance,
            &scenario.static_protocol,
            scenario.prefix,
            &scenario.static_nh_key,
            scenario.static_nexthop,
            scenario.static_description.clone(),
        );
        installer::install_static_route(self.collaborators.device, cfg)
            .await?;
        run.static_installed = true;

        // Check the route is held by the expected STATIC protocol instance.
        let path = StatePath::static_route_prefix(
            &scenario.instance,
            &scenario.static_protocol,
            scenario.prefix,
        );
        let expected = scenario.prefix.to_string();
        let state = self
            .verifier()
            .await_state(&path, &expected, scenario.convergence.timeout())
            .await?;
        run.observe(
            RunState::StaticInstalled,
            path.to_string(),
            state.observed,
        );

        Ok(())
    }

    async fn verify_static(&self, run: &mut Run) -> Result<(), Error> {
        self.verify_prefix(run, RunState::StaticVerified).await
    }

    async fn install_dynamic(&self, run: &mut Run) -> Result<(), Error> {
        let scenario = self.scenario;
        let session = self
            .collaborators
            .routing
            .open(scenario.session_params())
            .await
            .map_err(Error::SessionOpen)?;
        let installer = run.installer.insert(RouteInstaller::new(
            session,
            scenario.gribi.ack_timeout(),
        ));

        let nh = NextHopEntry::new(
            scenario.nh_index,
            scenario.gribi_nexthop,
            scenario.instance.clone(),
        );
        installer.install_next_hop(nh).await?;

        let nhg = NextHopGroupEntry::new(
            scenario.nhg_id,
            BTreeMap::from([(scenario.nh_index, 1)]),
            scenario.instance.clone(),
        );
        installer.install_next_hop_group(nhg).await?;

        let entry = Ipv4Entry::new(
            scenario.prefix,
            scenario.nhg_id,
            scenario.instance.clone(),
            None,
            scenario.ipv4_entry_tag.clone(),
        );
        installer.install_ipv4_entry(entry).await?;

        Ok(())
    }

    async fn verify_dynamic(&self, run: &mut Run) -> Result<(), Error> {
        let scenario = self.scenario;
        self.verify_prefix(run, RunState::DynamicVerified).await?;

        // Check which channel the forwarding table resolved the prefix
        // through.
        let path =
            StatePath::aft_origin_protocol(&scenario.instance, scenario.prefix);
        let expected = scenario.expected_origin.to_string();
        let state = self
            .verifier()
            .await_state(&path, &expected, scenario.convergence.timeout())
            .await?;
        let step = RunState::DynamicVerified;
        run.observe(step, path.to_string(), state.observed);

        Ok(())
    }

    async fn validate_traffic(&self, run: &mut Run) -> Result<(), Error> {
        let params = &self.scenario.traffic;
        let flow = FlowSpec::new(
            params.flow_name.clone(),
            params.src_endpoint.clone(),
            vec![params.dst_endpoint.clone()],
            self.scenario.dst_range(),
            params.packet_count,
            params.rate_pps,
        );

        let validator = TrafficValidator::new(
            self.collaborators.traffic,
            params.poll_interval(),
            params.stable_polls,
        );
        run.flow = Some(flow.name.clone());
        let result = validator
            .run_traffic_check(flow, params.duration())
            .await;
        run.flow = None;
        let result = result?;
        run.observe(
            RunState::TrafficValidated,
            format!("flow {} loss-pct", result.flow),
            Some(result.loss_pct.to_string()),
        );

        Ok(())
    }

    // Best-effort teardown, in reverse order of acquisition.
    async fn teardown(&self, run: &mut Run) -> Vec<Error> {
        let scenario = self.scenario;
        let mut errors = vec![];

        debug!("tearing down");
        if let Some(flow) = run.flow.take() {
            match self.collaborators.traffic.stop(&flow).await {
                // The flow might have never started.
                Ok(()) | Err(ClientError::UnknownFlow(..)) => (),
                Err(error) => errors.push(Error::Teardown {
                    step: "stop traffic flow",
                    error,
                }),
            }
        }

        if let Some(mut installer) = run.installer.take() {
            if scenario.gribi.flush_on_teardown {
                if let Err(error) = installer.flush(&scenario.instance).await {
                    errors.push(Error::Teardown {
                        step: "flush gRIBI entries",
                        error,
                    });
                }
            }
            if let Err(error) = installer.close().await {
                errors.push(Error::Teardown {
                    step: "close gRIBI session",
                    error,
                });
            }
        }

        if run.static_installed {
            if let Err(error) = self
                .collaborators
                .device
                .delete_static_route(&scenario.instance, scenario.prefix)
                .await
            {
                errors.push(Error::Teardown {
                    step: "delete static route",
                    error,
                });
            }
            run.static_installed = false;
        }

        if run.instance_created {
            if let Err(error) = self
                .collaborators
                .device
                .delete_network_instance(&scenario.instance)
                .await
            {
                errors.push(Error::Teardown {
                    step: "delete network instance",
                    error,
                });
            }
            run.instance_created = false;
        }

        if run.protocols_started {
            let topology = self.collaborators.topology;
            if let Err(error) = topology.stop_protocols().await {
                errors.push(Error::Teardown {
                    step: "stop ATE protocols",
                    error,
                });
            }
            run.protocols_started = false;
        }

        for error in &errors {
            error.log();
        }
        errors
    }

    // Waits until the AFT reports the scenario prefix.
    async fn verify_prefix(
        &self,
        run: &mut Run,
        step: RunState,
    ) -> Result<(), Error> {
        let scenario = self.scenario;
        let expected = scenario.prefix.to_string();
        let state = self
            .verifier()
            .await_prefix_state(
                &scenario.instance,
                scenario.prefix,
                &expected,
                scenario.convergence.timeout(),
            )
            .await?;
        let path = StatePath::aft_prefix(&scenario.instance, scenario.prefix);
        run.observe(step, path.to_string(), state.observed);

        Ok(())
    }

    fn verifier(&self) -> ConvergenceVerifier<'a, dyn Telemetry + 'a> {
        ConvergenceVerifier::new(
            self.collaborators.telemetry,
            self.scenario.convergence.poll_interval(),
        )
    }
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scenario", self.scenario)
            .finish_non_exhaustive()
    }
}

// ===== impl Run =====

impl Run {
    fn transition(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
    }

    fn observe(
        &mut self,
        step: RunState,
        subject: String,
        value: Option<String>,
    ) {
        debug!(%step, %subject, ?value, "observed state");
        let observation = Observation::new(step, subject, value);
        self.observations.push(observation);
    }
}

impl Default for Run {
    fn default() -> Run {
        Run {
            state: RunState::Unconfigured,
            protocols_started: false,
            instance_created: false,
            static_installed: false,
            installer: None,
            flow: None,
            observations: vec![],
        }
    }
}

//! The reconciliation loop
//!
//! Keeps the multiworld ledger and the live game eventually consistent.
//! Each tick re-derives the outstanding work from three local records:
//!
//! - the sent-locations index, so a checked location is reported once
//! - the received-items cursor, the number of ledger entries accounted for
//! - entries applied ahead of the cursor by a partially failed burst
//!
//! Nothing is retried within a tick; whatever failed is simply still
//! outstanding on the next one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use civ5_catalog::{Catalog, FillerAction, ItemType, LocationType};

use crate::client::config::ClientConfig;
use crate::client::sleep_or_exit;
use crate::client::state::{ConnectionState, Readiness};
use crate::error::{Error, Result};
use crate::host::{ClientMessage, HostSession};
use crate::protocol::{decode_push_table, pack_grants, Directive, GameLink, GrantKind, ModCommand, ReadinessProbe};

/// A game command and the ledger entries it accounts for
#[derive(Debug)]
struct PlannedCommand {
    command: ModCommand,
    entries: Vec<usize>,
}

#[derive(Debug, Default)]
struct GrantPlan {
    commands: Vec<PlannedCommand>,
    /// Entries that need no game command (unknown item, no tier left, no effect)
    accounted: Vec<usize>,
}

pub struct ReconciliationLoop<H> {
    config: ClientConfig,
    probe: ReadinessProbe,
    host: H,
    catalog: Arc<Catalog>,
    readiness: Readiness,
    sent_locations: HashMap<LocationType, BTreeSet<u32>>,
    items_cursor: usize,
    granted_ahead: BTreeSet<usize>,
    victory_reported: bool,
    game_contact: bool,
}

impl<H: HostSession> ReconciliationLoop<H> {
    pub fn new(config: ClientConfig, host: H, catalog: Arc<Catalog>) -> Self {
        Self {
            probe: config.probe(),
            config,
            host,
            catalog,
            readiness: Readiness::new(),
            sent_locations: HashMap::new(),
            items_cursor: 0,
            granted_ahead: BTreeSet::new(),
            victory_reported: false,
            game_contact: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.readiness.state()
    }

    /// Number of ledger entries accounted for
    pub fn items_cursor(&self) -> usize {
        self.items_cursor
    }

    pub fn sent_locations(&self, category: LocationType) -> Option<&BTreeSet<u32>> {
        self.sent_locations.get(&category)
    }

    pub fn victory_reported(&self) -> bool {
        self.victory_reported
    }

    /// Whether the game answered a probe since the last call
    pub fn take_game_contact(&mut self) -> bool {
        std::mem::take(&mut self.game_contact)
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.readiness.disconnected();
    }

    /// The Tuner port refused the socket
    pub(crate) fn mark_unreachable(&mut self) {
        self.readiness.game_probed(false);
    }

    /// Tick until exit is requested or the connection is lost
    ///
    /// Returns `Ok(())` on exit and the connection error otherwise; every
    /// other failure is contained within its tick.
    pub async fn run<L: GameLink>(&mut self, link: &mut L) -> Result<()> {
        let mut exit = self.host.subscribe_exit();
        while !self.host.exit_requested() {
            let delay = match self.tick(link).await {
                Ok(delay) => delay,
                Err(e) => {
                    tracing::debug!(error = %e, "leaving update loop");
                    self.mark_disconnected();
                    return Err(e);
                }
            };
            sleep_or_exit(delay, &mut exit).await;
        }
        Ok(())
    }

    /// One pass of the state machine; returns how long to wait before the next
    pub async fn tick<L: GameLink>(&mut self, link: &mut L) -> Result<Duration> {
        if !self.host.is_slot_connected() {
            return Ok(self.config.no_slot_retry_delay());
        }

        if !self.readiness.state().game_ready() && !self.check_game(link).await? {
            return Ok(self.config.tick_interval());
        }

        self.readiness.begin_mod_probe();
        let mod_ready = contain("probe_mod", self.probe.probe_mod(link).await)?.unwrap_or(false);
        self.readiness.mod_probed(mod_ready);
        if !mod_ready {
            // Catch a game that went away while we waited on the mod
            self.check_game(link).await?;
            return Ok(self.config.mod_retry_delay());
        }

        self.update_cycle(link).await?;
        Ok(self.config.tick_interval())
    }

    async fn check_game<L: GameLink>(&mut self, link: &mut L) -> Result<bool> {
        self.readiness.begin_game_probe();
        let ready = contain("probe_game", self.probe.probe_game(link).await)?.unwrap_or(false);
        self.readiness.game_probed(ready);
        self.game_contact |= ready;
        Ok(ready)
    }

    /// Outbound then inbound; a failure in one direction does not block the other
    ///
    /// Both directions run every cycle. Cycles never overlap, so an item
    /// burst cannot hold up location reports or start while another runs.
    async fn update_cycle<L: GameLink>(&mut self, link: &mut L) -> Result<()> {
        let outbound = update_step("process_push_table", self.process_push_table(link)).await;
        contain("process_push_table", outbound)?;

        let inbound = update_step("process_received_items", self.process_received_items(link)).await;
        contain("process_received_items", inbound)?;
        Ok(())
    }

    /// Fetch the mod's outbox and act on every directive in it
    pub async fn process_push_table<L: GameLink>(&mut self, link: &mut L) -> Result<()> {
        let payload = link
            .send_mod_command(&ModCommand::GetPushTable, self.config.mod_probe_response_size)
            .await?;
        let directives = decode_push_table(&payload)?;

        // The table is consumed on read, so one bad directive must not drop the rest
        let mut first_error = None;
        for directive in directives {
            let result = match directive {
                Directive::Sync => self.sync(link).await,
                Directive::LocationBatch { category, ids } => self.report_locations(category, &ids),
                Directive::Victory => self.report_victory(),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is_connection_lost() => return Err(e),
                Err(e) => {
                    tracing::debug!(error = %e, "push table directive failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rebuild local state from the host after the mod lost its own
    async fn sync<L: GameLink>(&mut self, link: &mut L) -> Result<()> {
        tracing::debug!("mod requested a full sync");
        self.sent_locations.clear();
        self.items_cursor = 0;
        self.granted_ahead.clear();

        let mut techs = Vec::new();
        for ap_id in self.host.checked_locations() {
            match self.catalog.location(ap_id) {
                Some(location) => {
                    self.sent_locations
                        .entry(location.location_type)
                        .or_default()
                        .insert(location.game_id);
                    if location.location_type == LocationType::Tech {
                        techs.push(location.game_id);
                    }
                }
                None => tracing::warn!(ap_id, "checked location is not in the catalog"),
            }
        }

        // Researched tech locations are lost with the mod's state too
        for command in ModCommand::batched(GrantKind::Techs, &techs, self.config.grant_batch_size) {
            link.send_mod_command(&command, self.config.command_response_size).await?;
        }
        Ok(())
    }

    fn report_locations(&mut self, category: LocationType, ids: &BTreeSet<u32>) -> Result<()> {
        let fresh: Vec<u32> = match self.sent_locations.get(&category) {
            Some(sent) => ids.difference(sent).copied().collect(),
            None => ids.iter().copied().collect(),
        };
        if fresh.is_empty() {
            return Ok(());
        }

        let locations: Vec<i64> = fresh
            .iter()
            .filter_map(|&game_id| match self.catalog.location_by_game_id(category, game_id) {
                Some(location) => Some(location.ap_id),
                None => {
                    tracing::warn!(%category, game_id, "ignoring unknown location");
                    None
                }
            })
            .collect();

        if !locations.is_empty() {
            tracing::debug!(%category, ?locations, "reporting checked locations");
            self.host.send_messages(vec![ClientMessage::LocationChecks { locations }])?;
        }
        self.sent_locations.entry(category).or_default().extend(fresh);
        Ok(())
    }

    fn report_victory(&mut self) -> Result<()> {
        if self.victory_reported {
            return Ok(());
        }
        self.host.send_messages(vec![ClientMessage::goal_complete()])?;
        self.victory_reported = true;
        tracing::debug!("goal completion reported");
        Ok(())
    }

    /// Grant every ledger entry past the cursor
    pub async fn process_received_items<L: GameLink>(&mut self, link: &mut L) -> Result<()> {
        let ledger_len = self.host.items_received_len();
        if self.items_cursor > ledger_len {
            tracing::warn!(cursor = self.items_cursor, ledger_len, "item ledger shrank, replaying it");
            self.items_cursor = 0;
            self.granted_ahead.clear();
        }
        if self.items_cursor == ledger_len {
            return Ok(());
        }

        let ledger: Vec<i64> = self.host.items_received_from(0).into_iter().map(|item| item.item).collect();
        let plan = self.plan_grants(&ledger);

        let mut remaining: HashMap<usize, usize> = HashMap::new();
        for planned in &plan.commands {
            for &index in &planned.entries {
                *remaining.entry(index).or_default() += 1;
            }
        }

        self.granted_ahead.extend(plan.accounted);

        let mut first_error = None;
        for planned in plan.commands {
            match link.send_mod_command(&planned.command, self.config.command_response_size).await {
                Ok(_) => {
                    for index in planned.entries {
                        if let Some(left) = remaining.get_mut(&index) {
                            *left -= 1;
                            if *left == 0 {
                                self.granted_ahead.insert(index);
                            }
                        }
                    }
                }
                Err(e) if e.is_connection_lost() => {
                    first_error = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::debug!(command = %planned.command.call_text(), error = %e, "grant failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.advance_cursor();
        first_error.map_or(Ok(()), Err)
    }

    /// Group pending entries into game commands, ordered by first entry
    fn plan_grants(&self, ledger: &[i64]) -> GrantPlan {
        let mut plan = GrantPlan::default();
        let mut receipts: HashMap<i64, usize> = HashMap::new();
        let mut grants: BTreeMap<GrantKind, Vec<(usize, u32)>> = BTreeMap::new();
        let mut effects: BTreeMap<FillerAction, (i64, Vec<usize>)> = BTreeMap::new();

        for (index, &item_id) in ledger.iter().enumerate() {
            // Tier = earlier receipts of the same item, counted over the whole prefix
            let seen = receipts.entry(item_id).or_insert(0);
            let tier = *seen;
            *seen += 1;

            if index < self.items_cursor || self.granted_ahead.contains(&index) {
                continue;
            }

            let Some(item) = self.catalog.item(item_id) else {
                tracing::warn!(error = %Error::UnknownItem(item_id), index, "skipping ledger entry");
                plan.accounted.push(index);
                continue;
            };

            let kind = match item.item_type {
                ItemType::Tech | ItemType::Era => GrantKind::Techs,
                ItemType::Policy => GrantKind::Policies,
                ItemType::PolicyBranch => GrantKind::PolicyBranches,
                ItemType::Bonus | ItemType::Trap => {
                    if item.actions.is_empty() {
                        tracing::warn!(item = %item.name, "item has no effect");
                        plan.accounted.push(index);
                    }
                    for (&action, &value) in &item.actions {
                        let (total, entries) = effects.entry(action).or_default();
                        *total += value;
                        entries.push(index);
                    }
                    continue;
                }
            };

            match item.game_id_for_tier(tier) {
                Some(game_id) => grants.entry(kind).or_default().push((index, game_id)),
                None => {
                    tracing::warn!(item = %item.name, tier, "no game id left for this tier");
                    plan.accounted.push(index);
                }
            }
        }

        for (kind, entries) in grants {
            plan.commands.extend(
                pack_grants(kind, entries, self.config.grant_batch_size)
                    .into_iter()
                    .map(|(command, entries)| PlannedCommand { command, entries }),
            );
        }
        for (action, (total, entries)) in effects {
            if total == 0 {
                plan.accounted.extend(entries);
            } else {
                plan.commands.push(PlannedCommand {
                    command: ModCommand::Change(action, total),
                    entries,
                });
            }
        }

        plan.commands.sort_by_key(|planned| planned.entries.first().copied().unwrap_or(usize::MAX));
        plan
    }

    fn advance_cursor(&mut self) {
        while self.granted_ahead.remove(&self.items_cursor) {
            self.items_cursor += 1;
        }
    }
}

/// Log entry and exit of one update step
async fn update_step<T, F>(label: &'static str, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tracing::debug!(step = label, "enter");
    let result = step.await;
    match &result {
        Ok(_) => tracing::debug!(step = label, "exit"),
        Err(e) => tracing::debug!(step = label, error = %e, "exit with error"),
    }
    result
}

/// Keep connection loss, swallow everything else
fn contain<T>(label: &'static str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_connection_lost() => Err(e),
        Err(e) if e.is_not_ready() => {
            tracing::debug!(step = label, error = %e, "game not ready");
            Ok(None)
        }
        Err(e) => {
            tracing::debug!(step = label, error = ?e, "step failed");
            Ok(None)
        }
    }
}

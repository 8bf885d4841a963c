//! Typed mod calls
//!
//! Every call the mod exposes over the Tuner port is built here, so the
//! scripting syntax and the frame length ceiling live in one place.

use civ5_catalog::FillerAction;

use crate::codec::MAX_COMMAND_LEN;

/// Script namespace the mod registers its functions under
pub const MOD_NAMESPACE: &str = "GameCore.Game.AP.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModCommand {
    IsModReady,
    GetPushTable,
    GrantTechs(Vec<u32>),
    GrantPolicies(Vec<u32>),
    UnlockPolicyBranches(Vec<u32>),
    Change(FillerAction, i64),
}

/// Id-list grant calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GrantKind {
    Techs,
    Policies,
    PolicyBranches,
}

impl GrantKind {
    pub fn command(self, ids: Vec<u32>) -> ModCommand {
        match self {
            GrantKind::Techs => ModCommand::GrantTechs(ids),
            GrantKind::Policies => ModCommand::GrantPolicies(ids),
            GrantKind::PolicyBranches => ModCommand::UnlockPolicyBranches(ids),
        }
    }
}

impl ModCommand {
    /// Call text without the namespace, e.g. `GrantTechs({1,2})`
    pub fn call_text(&self) -> String {
        match self {
            ModCommand::IsModReady => "IsModReady()".into(),
            ModCommand::GetPushTable => "GetPushTable()".into(),
            ModCommand::GrantTechs(ids) => format!("GrantTechs({})", lua_table(ids)),
            ModCommand::GrantPolicies(ids) => format!("GrantPolicies({})", lua_table(ids)),
            ModCommand::UnlockPolicyBranches(ids) => format!("UnlockPolicyBranches({})", lua_table(ids)),
            ModCommand::Change(action, value) => format!("{}({})", filler_call_name(*action), value),
        }
    }

    /// Fully qualified call text as sent in the frame body
    pub fn qualified(&self) -> String {
        format!("{}{}", MOD_NAMESPACE, self.call_text())
    }

    pub fn fits_frame(&self) -> bool {
        self.qualified().len() <= MAX_COMMAND_LEN
    }

    /// Split a grant into batches of at most `batch_size` ids that each fit a frame
    pub fn batched(kind: GrantKind, ids: &[u32], batch_size: usize) -> Vec<ModCommand> {
        pack_grants(kind, ids.iter().map(|&id| ((), id)), batch_size)
            .into_iter()
            .map(|(command, _)| command)
            .collect()
    }
}

/// Greedily pack `(tag, id)` entries into grant commands
///
/// Keeps entry order. Each command carries the tags of the entries it
/// grants, so callers can account for exactly what was sent.
pub fn pack_grants<T>(
    kind: GrantKind,
    entries: impl IntoIterator<Item = (T, u32)>,
    batch_size: usize,
) -> Vec<(ModCommand, Vec<T>)> {
    let batch_size = batch_size.max(1);
    let mut packed = Vec::new();
    let mut ids: Vec<u32> = Vec::new();
    let mut tags: Vec<T> = Vec::new();

    for (tag, id) in entries {
        if !ids.is_empty() {
            ids.push(id);
            let fits = ids.len() <= batch_size && kind.command(ids.clone()).fits_frame();
            ids.pop();
            if !fits {
                packed.push((kind.command(std::mem::take(&mut ids)), std::mem::take(&mut tags)));
            }
        }
        ids.push(id);
        tags.push(tag);
    }
    if !ids.is_empty() {
        packed.push((kind.command(ids), tags));
    }
    packed
}

fn lua_table(ids: &[u32]) -> String {
    let inner: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("{{{}}}", inner.join(","))
}

fn filler_call_name(action: FillerAction) -> &'static str {
    match action {
        FillerAction::ChangeAllCityPopulation => "ChangeAllCityPopulation",
        FillerAction::ChangeCulture => "ChangeCulture",
        FillerAction::ChangeCulturePerTurnForFree => "ChangeCulturePerTurnForFree",
        FillerAction::ChangeExtraHappinessPerCity => "ChangeExtraHappinessPerCity",
        FillerAction::ChangeFaith => "ChangeFaith",
        FillerAction::ChangeFreeGreatPeople => "ChangeNumFreeGreatPeople",
        FillerAction::ChangeFreePolicies => "ChangeNumFreePolicies",
        FillerAction::ChangeFreeTechs => "ChangeNumFreeTechs",
        FillerAction::ChangeGold => "ChangeGold",
        FillerAction::ChangeNewCityExtraPopulation => "ChangeNewCityExtraPopulation",
        FillerAction::DeclareWarRandom => "DeclareWarRandom",
        FillerAction::DenounceRandom => "DenounceRandom",
        FillerAction::StartGoldenAge => "StartGoldenAge",
    }
}

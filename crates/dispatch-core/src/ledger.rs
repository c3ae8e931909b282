//! Alerts and the response-team roster.
//!
//! Alert lifecycle:
//!
//! ```text
//! active --assign--> assigned --resolve--> resolved
//!   ^                   |
//!   +----unassign-------+
//! active --resolve--> resolved
//! ```
//!
//! A team is `busy` exactly while it is the `assigned_team` of an alert in
//! state `assigned`. Alerts are never removed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DispatchError, Result};
use crate::model::{Alert, AlertStatus, AgencyType, ResponseTeam, TeamStatus, UserStatus};
use crate::util::now_ms;

/// Result of a successful team assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    /// The team, now busy.
    pub team: ResponseTeam,
    /// The alert, now assigned.
    pub alert: Alert,
    /// Confirmation for the operator.
    pub message: String,
}

/// Owns alert and team state.
#[derive(Debug)]
pub struct AlertLedger {
    alerts: Vec<Alert>,
    by_id: HashMap<String, usize>,
    /// Keyed by team id.
    teams: HashMap<String, ResponseTeam>,
    next_seq: u64,
    user_status: UserStatus,
}

impl Default for AlertLedger {
    fn default() -> Self {
        Self {
            alerts: Vec::new(),
            by_id: HashMap::new(),
            teams: HashMap::new(),
            next_seq: 1,
            user_status: UserStatus::Available,
        }
    }
}

impl AlertLedger {
    /// Empty ledger with no teams.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with the standard roster.
    pub fn with_default_roster() -> Self {
        let mut ledger = Self::new();
        for (name, team_type) in default_roster() {
            // Names are non-empty constants.
            let _ = ledger.register_team(name, team_type, TeamStatus::Available);
        }
        ledger
    }

    /// Records a new alert with the next sequential id.
    pub fn create_alert(&mut self, location: &str, alert_type: &str, details: &str) -> Alert {
        let id = format!("alert-{}", self.next_seq);
        self.next_seq += 1;

        let alert = Alert {
            id: id.clone(),
            location: location.to_string(),
            alert_type: alert_type.to_string(),
            details: details.to_string(),
            created_at_ms: now_ms(),
            status: AlertStatus::Active,
            assigned_team: None,
        };
        self.by_id.insert(id.clone(), self.alerts.len());
        self.alerts.push(alert.clone());

        info!(alert_id = %id, location, alert_type, "alert created");
        alert
    }

    /// Adds or replaces a team. Names that differ only in case or
    /// whitespace map to the same id and so to the same team.
    ///
    /// A team that currently holds an assignment stays busy regardless of
    /// the requested status.
    pub fn register_team(
        &mut self,
        name: &str,
        team_type: AgencyType,
        status: TeamStatus,
    ) -> Result<ResponseTeam> {
        let id = team_id(name);
        if id.is_empty() {
            return Err(DispatchError::MissingArgument("team name"));
        }

        let mut status = status;
        if status == TeamStatus::Available && self.holds_assignment(&id) {
            warn!(team_id = %id, "re-registered team still holds an assignment; keeping busy");
            status = TeamStatus::Busy;
        }

        let team = ResponseTeam {
            id: id.clone(),
            name: name.trim().to_string(),
            team_type,
            status,
        };
        if let Some(prev) = self.teams.insert(id, team.clone()) {
            if prev.name != team.name {
                info!(team_id = %team.id, from = %prev.name, to = %team.name, "team renamed");
            }
        }
        Ok(team)
    }

    /// Assigns an available team to an alert.
    pub fn assign_team(&mut self, team_name: &str, alert_id: &str) -> Result<Assignment> {
        let key = team_id(team_name);
        if !self.teams.contains_key(&key) {
            return Err(DispatchError::TeamNotFound(team_name.to_string()));
        }
        let idx = self.alert_index(alert_id)?;

        let status = self.alerts[idx].status;
        if status != AlertStatus::Active {
            return Err(DispatchError::InvalidTransition {
                alert_id: alert_id.to_string(),
                from: status.as_str(),
                action: "assign",
            });
        }

        let team = self
            .teams
            .get_mut(&key)
            .ok_or_else(|| DispatchError::TeamNotFound(team_name.to_string()))?;
        if team.status != TeamStatus::Available {
            return Err(DispatchError::TeamUnavailable(team.name.clone()));
        }
        team.status = TeamStatus::Busy;
        let team = team.clone();

        let alert = &mut self.alerts[idx];
        alert.assigned_team = Some(team.id.clone());
        alert.status = AlertStatus::Assigned;
        let alert = alert.clone();

        info!(team_id = %team.id, alert_id = %alert.id, "team assigned");
        Ok(Assignment {
            message: format!("{} assigned to alert {}", team.name, alert.id),
            team,
            alert,
        })
    }

    /// Returns an assigned alert to `active` and frees its team.
    pub fn unassign(&mut self, alert_id: &str) -> Result<Alert> {
        let idx = self.alert_index(alert_id)?;
        let status = self.alerts[idx].status;
        if status != AlertStatus::Assigned {
            return Err(DispatchError::InvalidTransition {
                alert_id: alert_id.to_string(),
                from: status.as_str(),
                action: "unassign",
            });
        }
        self.release_team_of(idx);
        let alert = &mut self.alerts[idx];
        alert.status = AlertStatus::Active;
        info!(alert_id, "alert unassigned");
        Ok(alert.clone())
    }

    /// Marks an alert resolved, freeing its team if it had one.
    pub fn resolve(&mut self, alert_id: &str) -> Result<Alert> {
        let idx = self.alert_index(alert_id)?;
        let status = self.alerts[idx].status;
        if status == AlertStatus::Resolved {
            return Err(DispatchError::InvalidTransition {
                alert_id: alert_id.to_string(),
                from: status.as_str(),
                action: "resolve",
            });
        }
        self.release_team_of(idx);
        let alert = &mut self.alerts[idx];
        alert.status = AlertStatus::Resolved;
        info!(alert_id, "alert resolved");
        Ok(alert.clone())
    }

    /// Records the operator's availability.
    pub fn set_user_status(&mut self, status: &str) -> Result<UserStatus> {
        let parsed: UserStatus = status.parse()?;
        self.user_status = parsed;
        Ok(parsed)
    }

    /// Current operator availability.
    pub fn user_status(&self) -> UserStatus {
        self.user_status
    }

    /// Looks up an alert by id.
    pub fn get_alert(&self, alert_id: &str) -> Result<&Alert> {
        self.alert_index(alert_id).map(|idx| &self.alerts[idx])
    }

    /// Every alert in creation order.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Alerts still waiting for a team.
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect()
    }

    /// Alerts whose location matches `location`, ignoring case.
    pub fn alerts_at(&self, location: &str) -> Vec<Alert> {
        let wanted = location.to_lowercase();
        self.alerts
            .iter()
            .filter(|a| a.location.to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    /// Looks up a team by display name (case-insensitive) or id.
    pub fn get_team(&self, name: &str) -> Result<&ResponseTeam> {
        self.teams
            .get(&team_id(name))
            .ok_or_else(|| DispatchError::TeamNotFound(name.to_string()))
    }

    /// Roster sorted by team id.
    pub fn teams(&self) -> Vec<ResponseTeam> {
        let mut teams: Vec<_> = self.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.id.cmp(&b.id));
        teams
    }

    fn alert_index(&self, alert_id: &str) -> Result<usize> {
        self.by_id
            .get(alert_id)
            .copied()
            .ok_or_else(|| DispatchError::AlertNotFound(alert_id.to_string()))
    }

    fn holds_assignment(&self, team_id: &str) -> bool {
        self.alerts.iter().any(|a| {
            a.status == AlertStatus::Assigned && a.assigned_team.as_deref() == Some(team_id)
        })
    }

    fn release_team_of(&mut self, idx: usize) {
        let Some(team_id) = self.alerts[idx].assigned_team.take() else {
            return;
        };
        if let Some(team) = self.teams.get_mut(&team_id) {
            team.status = TeamStatus::Available;
        }
    }
}

/// The roster every fresh deployment starts with.
pub fn default_roster() -> [(&'static str, AgencyType); 4] {
    [
        ("FireTeam 1", AgencyType::Fire),
        ("FireTeam 2", AgencyType::Fire),
        ("Medic 1", AgencyType::Medical),
        ("FloodTeam 1", AgencyType::Flood),
    ]
}

/// Lowercased name with all whitespace removed: `FireTeam 1` is `fireteam1`.
fn team_id(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_iff_assigned(ledger: &AlertLedger) {
        for team in ledger.teams() {
            let holders = ledger
                .alerts()
                .iter()
                .filter(|a| {
                    a.status == AlertStatus::Assigned && a.assigned_team.as_deref() == Some(&team.id)
                })
                .count();
            assert!(holders <= 1, "team {} holds {holders} alerts", team.id);
            assert_eq!(team.status == TeamStatus::Busy, holders == 1, "team {}", team.id);
        }
        for alert in ledger.alerts() {
            assert_eq!(
                alert.assigned_team.is_some(),
                alert.status == AlertStatus::Assigned,
                "alert {}",
                alert.id
            );
        }
    }

    #[test]
    fn ids_are_sequential() {
        let mut l = AlertLedger::new();
        let ids: Vec<_> = (0..3)
            .map(|_| l.create_alert("Delhi", "fire", "").id)
            .collect();
        assert_eq!(ids, vec!["alert-1", "alert-2", "alert-3"]);
    }

    #[test]
    fn ids_not_reused_after_resolution() {
        let mut l = AlertLedger::with_default_roster();
        let mut last = 0;
        for _ in 0..20 {
            let a = l.create_alert("Pune", "flood", "");
            let n: u64 = a.id.trim_start_matches("alert-").parse().unwrap();
            assert!(n > last);
            last = n;
            l.assign_team("floodteam 1", &a.id).unwrap();
            l.resolve(&a.id).unwrap();
        }
        assert_eq!(l.alerts().len(), 20);
        busy_iff_assigned(&l);
    }

    #[test]
    fn assign_marks_team_busy() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        let out = l.assign_team("FIRETEAM 1", &a.id).unwrap();
        assert_eq!(out.team.status, TeamStatus::Busy);
        assert_eq!(out.alert.status, AlertStatus::Assigned);
        assert_eq!(out.alert.assigned_team.as_deref(), Some("fireteam1"));
        busy_iff_assigned(&l);
    }

    #[test]
    fn second_assignment_of_busy_team_fails() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        let b = l.create_alert("Agra", "fire", "");
        l.assign_team("fireteam 1", &a.id).unwrap();
        let err = l.assign_team("fireteam 1", &b.id).unwrap_err();
        assert_eq!(err, DispatchError::TeamUnavailable("FireTeam 1".into()));
        assert_eq!(l.get_alert(&b.id).unwrap().status, AlertStatus::Active);
        busy_iff_assigned(&l);
    }

    #[test]
    fn assign_error_order() {
        let mut l = AlertLedger::with_default_roster();
        assert!(matches!(
            l.assign_team("nobody", "alert-99"),
            Err(DispatchError::TeamNotFound(_))
        ));
        assert!(matches!(
            l.assign_team("medic 1", "alert-99"),
            Err(DispatchError::AlertNotFound(_))
        ));
    }

    #[test]
    fn team_found_by_id() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "medical", "");
        assert!(l.assign_team("medic1", &a.id).is_ok());
    }

    #[test]
    fn unassign_frees_team_and_allows_reassignment() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        let b = l.create_alert("Agra", "fire", "");
        l.assign_team("fireteam 1", &a.id).unwrap();
        let back = l.unassign(&a.id).unwrap();
        assert_eq!(back.status, AlertStatus::Active);
        assert_eq!(back.assigned_team, None);
        l.assign_team("fireteam 1", &b.id).unwrap();
        busy_iff_assigned(&l);
    }

    #[test]
    fn resolved_is_terminal() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        l.resolve(&a.id).unwrap();
        assert!(matches!(
            l.resolve(&a.id),
            Err(DispatchError::InvalidTransition { action: "resolve", .. })
        ));
        assert!(matches!(
            l.assign_team("fireteam 2", &a.id),
            Err(DispatchError::InvalidTransition { action: "assign", .. })
        ));
        assert!(matches!(
            l.unassign(&a.id),
            Err(DispatchError::InvalidTransition { action: "unassign", .. })
        ));
        assert_eq!(l.get_alert(&a.id).unwrap().status, AlertStatus::Resolved);
    }

    #[test]
    fn reregister_overwrites_but_keeps_assignment_busy() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        l.assign_team("fireteam 1", &a.id).unwrap();
        let t = l
            .register_team("fireteam 1", AgencyType::Disaster, TeamStatus::Available)
            .unwrap();
        assert_eq!(t.team_type, AgencyType::Disaster);
        assert_eq!(t.status, TeamStatus::Busy);
        busy_iff_assigned(&l);

        let t = l
            .register_team("  Rescue   Squad ", AgencyType::Disaster, TeamStatus::Available)
            .unwrap();
        assert_eq!(t.id, "rescuesquad");
        assert_eq!(l.get_team("rescue squad").unwrap().name, "Rescue   Squad");
        assert_eq!(l.teams().len(), 5);
    }

    #[test]
    fn names_with_same_id_are_one_team() {
        let mut l = AlertLedger::new();
        l.register_team("FireTeam 1", AgencyType::Fire, TeamStatus::Available)
            .unwrap();
        let a = l.create_alert("Delhi", "fire", "");
        l.assign_team("FireTeam 1", &a.id).unwrap();

        let t = l
            .register_team("Fire Team1", AgencyType::Fire, TeamStatus::Available)
            .unwrap();
        assert_eq!(t.id, "fireteam1");
        assert_eq!(t.status, TeamStatus::Busy);
        assert_eq!(l.teams().len(), 1);
        busy_iff_assigned(&l);

        let b = l.create_alert("Agra", "fire", "");
        assert_eq!(
            l.assign_team("fire team 1", &b.id).unwrap_err(),
            DispatchError::TeamUnavailable("Fire Team1".into())
        );

        l.resolve(&a.id).unwrap();
        assert_eq!(l.get_team("FireTeam 1").unwrap().status, TeamStatus::Available);
        l.assign_team("fireteam1", &b.id).unwrap();
        busy_iff_assigned(&l);
    }

    #[test]
    fn blank_team_name_is_rejected() {
        let mut l = AlertLedger::new();
        assert_eq!(
            l.register_team("   ", AgencyType::Fire, TeamStatus::Available)
                .unwrap_err(),
            DispatchError::MissingArgument("team name")
        );
    }

    #[test]
    fn user_status_validation() {
        let mut l = AlertLedger::new();
        assert_eq!(l.set_user_status("BUSY").unwrap(), UserStatus::Busy);
        assert_eq!(l.user_status(), UserStatus::Busy);
        assert!(matches!(
            l.set_user_status("away"),
            Err(DispatchError::InvalidStatus(_))
        ));
        assert_eq!(l.user_status(), UserStatus::Busy);
    }

    #[test]
    fn queries_filter_by_status_and_location() {
        let mut l = AlertLedger::with_default_roster();
        let a = l.create_alert("Delhi", "fire", "");
        l.create_alert("delhi", "flood", "");
        l.create_alert("Mumbai", "fire", "");
        l.assign_team("fireteam 1", &a.id).unwrap();

        assert_eq!(l.active_alerts().len(), 2);
        assert_eq!(l.alerts_at("DELHI").len(), 2);
        assert!(l.alerts_at("Del").is_empty());
    }
}

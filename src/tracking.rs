// src/tracking.rs
//! Live positions of team leaders and supervisors.

use chrono::Utc;

use crate::auth::{user_key, Actor, User};
use crate::error::{ApiError, ApiResult};
use crate::models::{Job, Location, LocationUpdateRequest, TrackedUser};
use crate::store::State;

impl State {
    /// Stores the caller's latest position, replacing the previous one.
    pub fn record_location(&mut self, actor: &Actor, request: &LocationUpdateRequest) -> ApiResult<Location> {
        if !actor.role.is_tracked() {
            return Err(ApiError::Forbidden(format!(
                "Location sharing is only used for team leaders and supervisors, not '{}'",
                actor.role
            )));
        }

        let location = Location {
            latitude: request.latitude,
            longitude: request.longitude,
            last_update: request.timestamp.unwrap_or_else(Utc::now),
        };
        self.tracking.insert(user_key(&actor.username), location.clone());
        log::debug!("Location updated: {}, {}", location.latitude, location.longitude);
        Ok(location)
    }

    /// Every tracked user with their last position and, for team leaders,
    /// the job they are currently out on. Admin only.
    pub fn tracking_overview(&self, actor: &Actor) -> ApiResult<Vec<TrackedUser>> {
        if !actor.role.can_view_tracking() {
            return Err(ApiError::Forbidden("Access denied. Admin only.".to_string()));
        }

        Ok(self
            .users
            .iter()
            .filter(|(_, user)| user.role.is_tracked())
            .map(|(key, user)| {
                let location = self.tracking.get(key);
                TrackedUser {
                    username: user.username.clone(),
                    name: user.name.clone(),
                    role: user.role,
                    latitude: location.map(|l| l.latitude),
                    longitude: location.map(|l| l.longitude),
                    last_update: location.map(|l| l.last_update),
                    current_job: self.active_job_led_by(user).map(|job| job.id.clone()),
                }
            })
            .collect())
    }

    /// Jobs name their team leader by username or by display name.
    fn active_job_led_by(&self, user: &User) -> Option<&Job> {
        self.jobs.iter().find(|job| {
            job.status.is_active()
                && job.team_leader.as_deref().map_or(false, |leader| {
                    let leader = leader.trim();
                    leader.eq_ignore_ascii_case(&user.username) || leader.eq_ignore_ascii_case(&user.name)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::inventory::test_support::actor;
    use crate::models::JobStatus;
    use chrono::TimeZone;

    fn add_user(state: &mut State, username: &str, name: &str, role: Role) {
        state.users.insert(
            user_key(username),
            User {
                username: username.to_string(),
                password_hash: String::new(),
                role,
                name: name.to_string(),
                email: String::new(),
                phone: String::new(),
            },
        );
    }

    fn update(latitude: f64, longitude: f64) -> LocationUpdateRequest {
        LocationUpdateRequest {
            username: String::new(),
            latitude,
            longitude,
            timestamp: None,
        }
    }

    fn job(id: &str, leader: &str, status: JobStatus) -> Job {
        let now = Utc::now();
        Job {
            id: id.into(),
            project_name: None,
            client_name: None,
            team_leader: Some(leader.into()),
            status,
            packing_materials: vec![],
            completion_data: None,
            history: vec![],
            completed_date: None,
            created_by: "admin".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_overview_lists_tracked_roles_with_active_job() {
        let mut state = State::seeded();
        add_user(&mut state, "teamLeader-user", "Rhys Moana", Role::TeamLeader);
        add_user(&mut state, "supervisor-user", "Ana Lee", Role::Supervisor);
        add_user(&mut state, "crew", "Crew", Role::Staff);
        state.jobs.push(job("1", "Rhys Moana", JobStatus::Completed));
        state.jobs.push(job("2", "Rhys Moana", JobStatus::PackingStart));

        let fix = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let mut request = update(-36.85, 174.76);
        request.timestamp = Some(fix);
        state.record_location(&actor(Role::TeamLeader), &request).unwrap();

        let overview = state.tracking_overview(&actor(Role::Admin)).unwrap();
        assert_eq!(overview.len(), 2);

        let leader = overview.iter().find(|u| u.role == Role::TeamLeader).unwrap();
        assert_eq!((leader.latitude, leader.longitude), (Some(-36.85), Some(174.76)));
        assert_eq!(leader.last_update, Some(fix));
        assert_eq!(leader.current_job.as_deref(), Some("2"));

        let supervisor = overview.iter().find(|u| u.role == Role::Supervisor).unwrap();
        assert!(supervisor.latitude.is_none());
        assert!(supervisor.current_job.is_none());
    }

    #[test]
    fn test_latest_update_replaces_previous() {
        let mut state = State::seeded();
        let supervisor = actor(Role::Supervisor);
        state.record_location(&supervisor, &update(1.0, 2.0)).unwrap();
        state.record_location(&supervisor, &update(3.0, 4.0)).unwrap();

        assert_eq!(state.tracking.len(), 1);
        assert_eq!(state.tracking["supervisor-user"].latitude, 3.0);
    }

    #[test]
    fn test_tracking_permissions() {
        let mut state = State::seeded();
        assert!(matches!(
            state.record_location(&actor(Role::Staff), &update(0.0, 0.0)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(state.tracking.is_empty());
        assert!(matches!(
            state.tracking_overview(&actor(Role::Supervisor)),
            Err(ApiError::Forbidden(_))
        ));
    }
}

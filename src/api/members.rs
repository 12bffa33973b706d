use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::membership_error;
use crate::gossip::GossipController;
use crate::membership::{Member, MemberState};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointView {
    pub member: Member,
    pub state: MemberState,
    pub heartbeat_time: i64,
    pub version: u64,
}

/// Everything the local member currently believes about the cluster
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersResponse {
    pub local: Member,
    pub cluster: String,
    pub working: bool,
    pub convergence_count: u32,
    pub convicted_time_ms: i64,
    pub live: Vec<Member>,
    pub dead: Vec<Member>,
    pub endpoints: Vec<EndpointView>,
}

#[instrument(skip(controller))]
pub async fn members(State(controller): State<Arc<GossipController>>) -> Result<Json<MembersResponse>> {
    let endpoints = controller
        .store()
        .entries()?
        .into_iter()
        .map(|entry| EndpointView {
            member: entry.member,
            state: entry.state,
            heartbeat_time: entry.heartbeat.heartbeat_time,
            version: entry.heartbeat.version,
        })
        .collect();

    Ok(Json(MembersResponse {
        local: controller.local_member().clone(),
        cluster: controller.cluster().to_string(),
        working: controller.is_working(),
        convergence_count: controller.convergence_count(),
        convicted_time_ms: controller.convicted_time(),
        live: controller.live_members()?,
        dead: controller.dead_members()?,
        endpoints,
    }))
}

#[instrument(skip(controller))]
pub async fn member(
    State(controller): State<Arc<GossipController>>,
    Path(id): Path<String>,
) -> Result<Json<EndpointView>> {
    controller
        .store()
        .entries()?
        .into_iter()
        .find(|entry| entry.member.id() == id)
        .map(|entry| {
            Json(EndpointView {
                member: entry.member,
                state: entry.state,
                heartbeat_time: entry.heartbeat.heartbeat_time,
                version: entry.heartbeat.version,
            })
        })
        .ok_or_else(|| membership_error!("No member with id {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::HeartbeatState;
    use crate::settings::Settings;
    use crate::transport::MemoryNetwork;

    #[tokio::test]
    async fn test_members_view() {
        let settings = Settings {
            cluster: "alpha".to_string(),
            member_id: Some("a".to_string()),
            listen_port: 9000,
            ..Settings::default()
        };
        let network = MemoryNetwork::new();
        let transport = Arc::new(network.transport(settings.gossip_addr()));
        let controller = Arc::new(GossipController::new(settings, transport, None).unwrap());

        let b = Member::new("alpha", "127.0.0.1:9001".parse().unwrap(), "b");
        controller.store().put_heartbeat(b.clone(), HeartbeatState::new(10, 2));
        controller.store().mark_down(&b).unwrap();

        let Json(view) = members(State(controller.clone())).await.unwrap();
        assert_eq!(view.local, *controller.local_member());
        assert_eq!(view.cluster, "alpha");
        assert!(!view.working);
        assert_eq!(view.convergence_count, 1);
        assert!(view.live.is_empty());
        assert_eq!(view.dead, vec![b.clone()]);
        assert_eq!(view.endpoints.len(), 2);
        assert!(view.endpoints.contains(&EndpointView {
            member: b,
            state: MemberState::Down,
            heartbeat_time: 10,
            version: 2,
        }));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("convictedTimeMs").is_some());

        let Json(found) = member(State(controller.clone()), Path("b".to_string()))
            .await
            .unwrap();
        assert_eq!(found.state, MemberState::Down);
        let missing = member(State(controller), Path("zzz".to_string())).await.unwrap_err();
        assert_eq!(missing.error_type(), "membership_error");
    }
}

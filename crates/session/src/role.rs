//! Per-role wiring: which server events a session listens to and what each
//! of them does.

use dispatchlink_protocol::Role;
use dispatchlink_protocol::constants::{EVENT_ORDER_ACCEPTED, EVENT_ORDER_REJECTED, EVENT_STATUS};

/// What an inbound server event does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Decode an order and queue it.
    NewOrder,
    /// Remove the claimed order from the queue.
    OrderClaimed,
    /// Sync connectivity from the `online` flag.
    Status,
}

/// Role plus the server events routed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub role: Role,
    routes: Vec<(String, Route)>,
}

impl RoleProfile {
    /// Operations console: new orders and status only.
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            routes: vec![
                (Role::Admin.new_order_event().to_string(), Route::NewOrder),
                (EVENT_STATUS.to_string(), Route::Status),
            ],
        }
    }

    /// Field courier: new orders, claims by other couriers, and status.
    pub fn courier() -> Self {
        Self {
            role: Role::Courier,
            routes: vec![
                (Role::Courier.new_order_event().to_string(), Route::NewOrder),
                (EVENT_ORDER_ACCEPTED.to_string(), Route::OrderClaimed),
                (EVENT_ORDER_REJECTED.to_string(), Route::OrderClaimed),
                (EVENT_STATUS.to_string(), Route::Status),
            ],
        }
    }

    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::admin(),
            Role::Courier => Self::courier(),
        }
    }

    /// Adds or replaces the route for `event`.
    pub fn with_route(mut self, event: impl Into<String>, route: Route) -> Self {
        let event = event.into();
        self.routes.retain(|(name, _)| *name != event);
        self.routes.push((event, route));
        self
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, Route)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), *route))
    }

    pub fn route_for(&self, event: &str) -> Option<Route> {
        self.routes
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, route)| *route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_routes_claims() {
        let profile = RoleProfile::courier();
        assert_eq!(profile.route_for("new-order"), Some(Route::NewOrder));
        assert_eq!(profile.route_for("order-accepted"), Some(Route::OrderClaimed));
        assert_eq!(profile.route_for("order-rejected"), Some(Route::OrderClaimed));
        assert_eq!(profile.route_for("new-order-admin"), None);
    }

    #[test]
    fn admin_does_not_route_claims() {
        let profile = RoleProfile::admin();
        assert_eq!(profile.route_for("new-order-admin"), Some(Route::NewOrder));
        assert_eq!(profile.route_for("order-accepted"), None);
        assert_eq!(profile.route_for("status"), Some(Route::Status));
    }

    #[test]
    fn with_route_replaces_existing() {
        let profile = RoleProfile::admin()
            .with_route("order-cancelled", Route::OrderClaimed)
            .with_route("status", Route::OrderClaimed);
        assert_eq!(profile.route_for("order-cancelled"), Some(Route::OrderClaimed));
        assert_eq!(profile.route_for("status"), Some(Route::OrderClaimed));
        assert_eq!(profile.routes().filter(|(n, _)| *n == "status").count(), 1);
    }
}

use dispatchlink_protocol::OrderNotification;

/// Pending order notifications in arrival order.
///
/// Only the session loop mutates it; observers get copies through
/// [`SessionSnapshot`](crate::types::SessionSnapshot).
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    entries: Vec<OrderNotification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notification. Duplicate order ids are not filtered here.
    pub fn push(&mut self, notification: OrderNotification) {
        self.entries.push(notification);
    }

    /// Removes every entry for `order_id`. Returns how many were removed.
    pub fn remove_by_order_id(&mut self, order_id: &str) -> usize {
        let len_before = self.entries.len();
        self.entries.retain(|n| n.order_id != order_id);
        len_before - self.entries.len()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.entries.iter().any(|n| n.order_id == order_id)
    }

    /// Iterate in arrival order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &OrderNotification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<OrderNotification> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatchlink_protocol::Role;

    fn order(id: &str) -> OrderNotification {
        OrderNotification::decode(Role::Courier, &serde_json::json!({ "orderId": id })).unwrap()
    }

    fn ids(q: &NotificationQueue) -> Vec<&str> {
        q.iter().map(|n| n.order_id.as_str()).collect()
    }

    #[test]
    fn push_keeps_arrival_order() {
        let mut q = NotificationQueue::new();
        q.push(order("A"));
        q.push(order("B"));
        q.push(order("C"));
        assert_eq!(ids(&q), vec!["A", "B", "C"]);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn remove_middle_preserves_order() {
        let mut q = NotificationQueue::new();
        for id in ["A", "B", "C"] {
            q.push(order(id));
        }
        assert_eq!(q.remove_by_order_id("B"), 1);
        assert_eq!(ids(&q), vec!["A", "C"]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut q = NotificationQueue::new();
        q.push(order("A"));
        assert_eq!(q.remove_by_order_id("Z"), 0);
        assert_eq!(ids(&q), vec!["A"]);
    }

    #[test]
    fn remove_drops_all_duplicates() {
        let mut q = NotificationQueue::new();
        q.push(order("A"));
        q.push(order("B"));
        q.push(order("A"));
        assert_eq!(q.remove_by_order_id("A"), 2);
        assert_eq!(ids(&q), vec!["B"]);
        assert!(!q.contains("A"));
    }

    #[test]
    fn clear_empties() {
        let mut q = NotificationQueue::new();
        q.push(order("A"));
        q.clear();
        assert!(q.is_empty());
        assert!(q.to_vec().is_empty());
    }
}

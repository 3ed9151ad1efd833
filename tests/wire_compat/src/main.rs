fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use dispatchlink_protocol::{
        Address, EnginePacket, Enrichment, OrderClaim, OrderNotification, OutboundEvent,
        PacketError, PaymentMethod, Role, SocketPacket, StatusPayload, Zone,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Returns one raw frame from `frames.json`.
    fn frame(key: &str) -> String {
        load_fixture("frames.json")[key]
            .as_str()
            .unwrap_or_else(|| panic!("missing frame {key}"))
            .to_string()
    }

    // --- Order payloads ---

    #[test]
    fn fixture_new_order_courier() {
        let order =
            OrderNotification::decode(Role::Courier, &load_fixture("new_order_courier.json"))
                .unwrap();

        assert_eq!(order.order_id, "665f1c2e9b1d4a0012ab34cd");
        assert_eq!(order.label(), "#1001");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].quantity, 1);
        assert_eq!(order.effective_total(), 24.75);
        assert_eq!(order.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(
            order.provider.as_ref().and_then(|p| p.email.as_deref()),
            Some("pedidos@doncarlo.example")
        );
        assert!(matches!(
            order.delivery_address,
            Some(Address::Structured { ref city, .. }) if city.as_deref() == Some("Buenos Aires")
        ));
        assert_eq!(
            order.created_at.map(|t| t.to_rfc3339()),
            Some("2024-06-04T14:05:18.123+00:00".to_string())
        );

        let Enrichment::Courier(details) = &order.enrichment else {
            panic!("expected courier enrichment");
        };
        assert_eq!(details.courier_earnings, Some(2.8));
        assert_eq!(details.distance_km, Some(3.2));
        assert!(matches!(
            &details.zone,
            Some(Zone::Detail { id, name }) if id.as_deref() == Some("7") && name == "Centro"
        ));
    }

    #[test]
    fn fixture_new_order_admin() {
        let order = OrderNotification::decode(Role::Admin, &load_fixture("new_order_admin.json"))
            .unwrap();

        assert_eq!(order.label(), "#1002");
        assert_eq!(order.items[0].line_total(), 31.0);
        assert_eq!(order.payment_method, Some(PaymentMethod::Other));
        assert_eq!(
            order.delivery_address.as_ref().map(Address::summary).as_deref(),
            Some("Thames 2100, Palermo")
        );

        let Enrichment::Admin(details) = &order.enrichment else {
            panic!("expected admin enrichment");
        };
        assert_eq!(details.provider_payout, Some(27.9));
        assert_eq!(details.platform_commission, Some(3.1));
        assert_eq!(order.enrichment.zone().map(Zone::name), Some("Palermo"));
        assert_eq!(order.enrichment.distance_km(), Some(5.4));
    }

    #[test]
    fn same_payload_decodes_per_role() {
        let payload = load_fixture("new_order_courier.json");
        let admin = OrderNotification::decode(Role::Admin, &payload).unwrap();
        let courier = OrderNotification::decode(Role::Courier, &payload).unwrap();
        assert_eq!(admin.order_id, courier.order_id);
        assert!(matches!(admin.enrichment, Enrichment::Admin(_)));
        assert!(matches!(courier.enrichment, Enrichment::Courier(_)));
    }

    #[test]
    fn fixture_claims() {
        assert_eq!(
            OrderClaim::decode(&load_fixture("order_accepted.json")).unwrap(),
            "665f1c2e9b1d4a0012ab34cd"
        );
        assert_eq!(OrderClaim::decode(&load_fixture("order_rejected.json")).unwrap(), "1001");
    }

    #[test]
    fn fixture_new_order_with_both_spellings() {
        let order =
            OrderNotification::decode(Role::Courier, &load_fixture("new_order_mongo.json"))
                .unwrap();

        assert_eq!(order.order_id, "ORD-1003");
        assert_eq!(order.items[0].unit_price, 1.4);
        assert_eq!(order.enrichment.distance_km(), Some(2.05));
        assert_eq!(
            order.delivery_address.as_ref().map(Address::summary).as_deref(),
            Some("Av. Santa Fe 3253, Palermo")
        );
    }

    #[test]
    fn fixture_claim_with_both_spellings() {
        assert_eq!(
            OrderClaim::decode(&load_fixture("order_accepted_mongo.json")).unwrap(),
            "ORD-1003"
        );
    }

    #[test]
    fn fixture_status_keeps_extra_fields() {
        let status = StatusPayload::decode(&load_fixture("status.json")).unwrap();
        assert_eq!(status.online, Some(false));
        assert_eq!(status.extra["connectedDeliverers"], 4);
        assert!(status.extra.contains_key("serverTime"));
    }

    // --- Socket.IO frames ---

    #[test]
    fn frame_open_handshake() {
        let EnginePacket::Open(open) = EnginePacket::decode(&frame("open")).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(open.ping_interval, 25_000);
        assert_eq!(open.ping_timeout, 20_000);
        assert_eq!(open.max_payload, Some(1_000_000));
    }

    #[test]
    fn frame_namespace_lifecycle() {
        assert!(matches!(
            EnginePacket::decode(&frame("namespace_connect")).unwrap(),
            EnginePacket::Message(SocketPacket::Connect { ref namespace, data: Some(_) }) if namespace == "/"
        ));

        let EnginePacket::Message(SocketPacket::ConnectError { data, .. }) =
            EnginePacket::decode(&frame("namespace_refused")).unwrap()
        else {
            panic!("expected connect error");
        };
        assert_eq!(SocketPacket::connect_error_message(&data), "Not authorized");

        assert!(matches!(
            EnginePacket::decode(&frame("server_disconnect")).unwrap(),
            EnginePacket::Message(SocketPacket::Disconnect { .. })
        ));
        assert_eq!(EnginePacket::decode(&frame("engine_close")).unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode(&frame("ping")).unwrap(), EnginePacket::Ping(None));
    }

    #[test]
    fn frame_events() {
        let EnginePacket::Message(SocketPacket::Event { name, args, ack_id, .. }) =
            EnginePacket::decode(&frame("new_order")).unwrap()
        else {
            panic!("expected event");
        };
        assert_eq!(name, "new-order");
        assert_eq!(ack_id, None);
        let order = OrderNotification::decode(Role::Courier, &args[0]).unwrap();
        assert_eq!(order.label(), "#7");

        assert!(matches!(
            EnginePacket::decode(&frame("event_with_ack")).unwrap(),
            EnginePacket::Message(SocketPacket::Event { ack_id: Some(15), .. })
        ));

        let EnginePacket::Message(packet) = EnginePacket::decode(&frame("foreign_namespace")).unwrap()
        else {
            panic!("expected message");
        };
        assert_eq!(packet.namespace(), "/admin");
    }

    #[test]
    fn frame_binary_is_rejected() {
        assert!(matches!(
            EnginePacket::decode(&frame("binary_event")),
            Err(PacketError::Unsupported(_))
        ));
    }

    #[test]
    fn join_frames_match_server_expectations() {
        for (role, identity, expected) in [
            (Role::Admin, "admin-1", r#"42["join-admin",{"adminId":"admin-1"}]"#),
            (
                Role::Courier,
                "courier-42",
                r#"42["join-deliverer",{"delivererId":"courier-42"}]"#,
            ),
        ] {
            let join = OutboundEvent::new(role.join_channel(), role.join_payload(identity));
            let text = EnginePacket::Message(SocketPacket::event(join.name, join.payload))
                .encode()
                .unwrap();
            assert_eq!(text, expected);
        }
    }
}

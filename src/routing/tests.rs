//! Routing State Tests
//!
//! ## Test Scopes
//! - **Cells**: placement of nodes by shared prefix and next digit.
//! - **Slots**: capacity, ordering and eviction.
//! - **Next hop**: surrogate routing decisions on hand-built tables.
//! - **Backpointers**: bookkeeping per level.

#[cfg(test)]
mod tests {
    use crate::identifier::types::padded;
    use crate::routing::backpointers::Backpointers;
    use crate::routing::table::{RoutingTable, SLOT_SIZE};
    use crate::routing::types::{Cell, Node};
    use std::net::SocketAddr;

    fn node(prefix: &str, port: u16) -> Node {
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        Node::new(padded(prefix), addr)
    }

    // ============================================================
    // CELL TESTS
    // ============================================================

    #[test]
    fn test_cell_of() {
        let local = padded("583f");

        assert_eq!(
            Cell::of(&local, &padded("70d1")),
            Some(Cell { level: 0, digit: 7 })
        );
        assert_eq!(
            Cell::of(&local, &padded("58ff")),
            Some(Cell {
                level: 2,
                digit: 0xf
            })
        );
        assert_eq!(Cell::of(&local, &local), None);
    }

    // ============================================================
    // TABLE TESTS
    // ============================================================

    #[test]
    fn test_table_never_contains_local_node() {
        let local = node("583f", 5000);
        let table = RoutingTable::new(local.clone());

        let outcome = table.add(local.clone());

        assert!(!outcome.added);
        assert!(table.is_empty());
        assert!(!table.contains(&local.id));
    }

    #[test]
    fn test_add_is_idempotent() {
        let table = RoutingTable::new(node("583f", 5000));
        let peer = node("70d1", 5001);

        assert!(table.add(peer.clone()).added);
        assert!(!table.add(peer.clone()).added);
        assert_eq!(table.len(), 1);
        assert!(table.contains(&peer.id));
    }

    #[test]
    fn test_add_refreshes_address() {
        let table = RoutingTable::new(node("583f", 5000));
        table.add(node("70d1", 5001));
        table.add(node("70d1", 6001));

        let slot = table.slot(Cell { level: 0, digit: 7 });
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].addr.port(), 6001);
    }

    #[test]
    fn test_full_slot_evicts_furthest() {
        let table = RoutingTable::new(node("0000", 5000));

        table.add(node("1300", 5004));
        table.add(node("1000", 5001));
        table.add(node("1100", 5002));
        let outcome = table.add(node("1200", 5003));

        assert!(outcome.added);
        assert_eq!(outcome.evicted.map(|n| n.id), Some(padded("1300")));

        let slot = table.slot(Cell { level: 0, digit: 1 });
        assert_eq!(slot.len(), SLOT_SIZE);
        assert_eq!(
            slot.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![padded("1000"), padded("1100"), padded("1200")]
        );
    }

    #[test]
    fn test_full_slot_rejects_further_node() {
        let table = RoutingTable::new(node("0000", 5000));
        table.add(node("1000", 5001));
        table.add(node("1100", 5002));
        table.add(node("1200", 5003));

        let outcome = table.add(node("1f00", 5004));

        assert!(!outcome.added);
        assert!(outcome.evicted.is_none());
        assert!(!table.contains(&padded("1f00")));
    }

    #[test]
    fn test_remove_empties_cell() {
        let table = RoutingTable::new(node("583f", 5000));
        let peer = node("70d1", 5001);
        table.add(peer.clone());

        assert!(table.remove(&peer.id));
        assert!(!table.remove(&peer.id), "second removal is a no-op");
        assert!(table.is_empty());
        assert!(table.slot(Cell { level: 0, digit: 7 }).is_empty());
    }

    #[test]
    fn test_level_lists_row() {
        let table = RoutingTable::new(node("70d1", 5000));
        table.add(node("583f", 5001));
        table.add(node("70f5", 5002));
        table.add(node("70fa", 5003));

        assert_eq!(table.level(0).len(), 1);
        assert_eq!(table.level(2).len(), 2);
        assert!(table.level(1).is_empty());
    }

    // ============================================================
    // NEXT HOP TESTS
    // ============================================================

    #[test]
    fn test_lone_table_routes_to_itself() {
        let local = node("583f", 5000);
        let table = RoutingTable::new(local.clone());

        assert_eq!(table.next_hop(&padded("70c3")), local);
        assert_eq!(table.next_hop(&padded("0000")), local);
        assert_eq!(table.next_hop(&local.id), local);
    }

    #[test]
    fn test_next_hop_exact_digit() {
        let table = RoutingTable::new(node("583f", 5000));
        table.add(node("70d1", 5001));
        table.add(node("70f5", 5002));
        table.add(node("70fa", 5003));

        // All three sit in cell (0, 7); the one closest to the target wins.
        assert_eq!(table.next_hop(&padded("70c3")).id, padded("70d1"));
        assert_eq!(table.next_hop(&padded("70f9")).id, padded("70fa"));
    }

    #[test]
    fn test_next_hop_surrogate_wraps_upward() {
        let local = node("583f", 5000);
        let table = RoutingTable::new(local.clone());
        table.add(node("70d1", 5001));

        // 3 -> 4 -> 5 reaches the local digit before 7.
        assert_eq!(table.next_hop(&padded("3f8a")), local);
        // 6 -> 7 reaches the populated cell first.
        assert_eq!(table.next_hop(&padded("6395")).id, padded("70d1"));
        // b -> ... -> f -> 0 -> ... -> 5 wraps around to the local digit.
        assert_eq!(table.next_hop(&padded("beef")), local);
    }

    #[test]
    fn test_next_hop_descends_levels() {
        let table = RoutingTable::new(node("70d1", 5000));
        table.add(node("583f", 5001));
        table.add(node("70f5", 5002));
        table.add(node("70fa", 5003));

        // Level 0 and 1 resolve to the local node, level 2 scans f and finds (2, f).
        assert_eq!(table.next_hop(&padded("60f4")).id, padded("70f5"));
        // e is empty, f holds both 70f5 and 70fa; 70f5 is numerically closer.
        assert_eq!(table.next_hop(&padded("63e9")).id, padded("70f5"));
        // c -> d is the local digit; the local node is root.
        assert_eq!(table.next_hop(&padded("70c3")).id, padded("70d1"));
    }

    #[test]
    fn test_replacement_for_prefers_deeper_rows() {
        let table = RoutingTable::new(node("70d1", 5000));
        table.add(node("583f", 5001));
        table.add(node("70f5", 5002));
        table.add(node("70fa", 5003));

        // A peer keeping us at level 0 can use anything sharing the leading 7.
        assert_eq!(
            table.replacement_for(0).map(|n| n.id),
            Some(padded("70f5"))
        );
        assert!(table.replacement_for(2).is_none());
    }

    // ============================================================
    // BACKPOINTER TESTS
    // ============================================================

    #[test]
    fn test_backpointers_by_level() {
        let local = node("70d1", 5000);
        let backpointers = Backpointers::new(local.clone());

        assert!(backpointers.add(node("583f", 5001)));
        assert!(backpointers.add(node("70f5", 5002)));
        assert!(!backpointers.add(node("70f5", 5002)), "duplicate is ignored");
        assert!(!backpointers.add(local));

        assert_eq!(backpointers.get(0).len(), 1);
        assert_eq!(backpointers.get(2).len(), 1);
        assert_eq!(backpointers.len(), 2);
    }

    #[test]
    fn test_backpointer_remove_is_idempotent() {
        let backpointers = Backpointers::new(node("70d1", 5000));
        let peer = node("583f", 5001);
        backpointers.add(peer.clone());

        assert!(backpointers.remove(&peer.id));
        assert!(!backpointers.remove(&peer.id));
        assert!(!backpointers.contains(&peer.id));
        assert!(backpointers.is_empty());
    }
}

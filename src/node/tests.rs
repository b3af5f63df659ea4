//! Overlay Node Tests
//!
//! Meshes of nodes on the in-memory network.
//!
//! ## Test Scopes
//! - **Bootstrap**: a lone node and joins by address.
//! - **Root Resolution**: the four-node reference mesh and a fuzzed mesh checked
//!   against a global view of the membership.
//! - **Membership**: join and leave bookkeeping, duplicate ids, replayed notifications,
//!   concurrent joins and fuzzed departures.
//! - **Failures**: crashed nodes left in tables, neighbour probes and cell repair.

#[cfg(test)]
mod tests {
    use crate::error::OverlayError;
    use crate::identifier::types::padded;
    use crate::identifier::{DIGITS, Id};
    use crate::node::testing::Mesh;
    use crate::routing::types::Cell;
    use crate::rpc::protocol::{Request, Response};
    use crate::rpc::transport::RpcHandler;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const A: &str = "583f";
    const B: &str = "70d1";
    const C: &str = "70f5";
    const D: &str = "70fa";

    async fn reference_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        for prefix in [A, B, C, D] {
            mesh.add(padded(prefix)).await.unwrap();
        }
        mesh
    }

    async fn assert_global_view(mesh: &Mesh, rng: &mut StdRng, targets: usize) {
        for _ in 0..targets {
            let target = Id::random(rng);
            let expected = mesh.expected_root(&target);

            for node in &mesh.nodes {
                let route = node.route(target).await.unwrap();
                assert_eq!(route.root.id, expected, "{} from {}", target, node.id());
            }
        }
    }

    async fn assert_root_everywhere(mesh: &Mesh, target: &str, root: &str) {
        let target = padded(target);
        for node in &mesh.nodes {
            let route = node.route(target).await.unwrap();
            assert_eq!(
                route.root.id,
                padded(root),
                "{}: root of {} should be {}",
                node.id(),
                target,
                root
            );
        }
    }

    // ============================================================
    // BOOTSTRAP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_lone_node_is_root_of_everything() {
        let mut mesh = Mesh::new();
        let node = mesh.add(padded(A)).await.unwrap();

        for target in ["0000", "583f", "ffff", "70d1"] {
            let route = node.route(padded(target)).await.unwrap();
            assert_eq!(route.root.id, node.id());
            assert_eq!(route.hops(), 0);
        }
        assert!(node.table().is_empty());
    }

    #[tokio::test]
    async fn test_join_via_address() {
        let mut mesh = Mesh::new();
        let first = mesh.add(padded(A)).await.unwrap();
        let second = mesh.spawn(padded(B));

        second.join_via(first.local_node().addr).await.unwrap();

        assert!(second.table().contains(&first.id()));
        assert!(first.table().contains(&second.id()));
        assert!(first.backpointers().contains(&second.id()));
        assert!(second.backpointers().contains(&first.id()));
    }

    // ============================================================
    // ROOT RESOLUTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_reference_mesh_roots() {
        let mesh = reference_mesh().await;

        assert_root_everywhere(&mesh, "3f8a", A).await;
        assert_root_everywhere(&mesh, "520c", A).await;
        assert_root_everywhere(&mesh, "58ff", A).await;
        assert_root_everywhere(&mesh, "70c3", B).await;
        assert_root_everywhere(&mesh, "60f4", C).await;
        assert_root_everywhere(&mesh, "70a2", B).await;
        assert_root_everywhere(&mesh, "6395", B).await;
        assert_root_everywhere(&mesh, "683f", B).await;
        assert_root_everywhere(&mesh, "63e5", C).await;
        assert_root_everywhere(&mesh, "63e9", D).await;
        assert_root_everywhere(&mesh, "beef", A).await;
    }

    #[tokio::test]
    async fn test_reference_mesh_after_leave() {
        let mut mesh = reference_mesh().await;

        mesh.leave(&padded(A)).await;

        assert_root_everywhere(&mesh, "3f8a", B).await;
        assert_root_everywhere(&mesh, "520c", B).await;
        assert_root_everywhere(&mesh, "58ff", C).await;

        for node in &mesh.nodes {
            assert!(!node.table().contains(&padded(A)));
            assert!(!node.backpointers().contains(&padded(A)));
        }
    }

    #[tokio::test]
    async fn test_fuzzed_mesh_agrees_with_global_view() {
        let mut rng = StdRng::seed_from_u64(0x7a9e);
        let mut mesh = Mesh::new();

        for _ in 0..8 {
            mesh.add(Id::random(&mut rng)).await.unwrap();
        }

        for _ in 0..60 {
            let target = Id::random(&mut rng);
            let expected = mesh.expected_root(&target);

            for node in &mesh.nodes {
                let route = node.route(target).await.unwrap();
                assert_eq!(route.root.id, expected, "{} from {}", target, node.id());
                assert!(route.hops() <= DIGITS);
            }
        }
    }

    #[tokio::test]
    async fn test_route_path_starts_and_ends_correctly() {
        let mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));

        let route = a.route(padded("63e9")).await.unwrap();

        assert_eq!(route.path.first().map(|n| n.id), Some(a.id()));
        assert_eq!(route.path.last().map(|n| n.id), Some(padded(D)));
        assert_eq!(route.hops(), route.path.len() - 1);
    }

    // ============================================================
    // MEMBERSHIP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_join_announces_to_prefix_peers() {
        let mesh = reference_mesh().await;
        let c = mesh.get(&padded(C));
        let d = mesh.get(&padded(D));
        let b = mesh.get(&padded(B));

        // D shares "70f" with C and "70" with B.
        assert!(c.table().contains(&d.id()));
        assert!(b.table().contains(&d.id()));
        assert!(d.table().contains(&c.id()));
        assert!(d.table().contains(&b.id()));
        assert!(d.backpointers().contains(&c.id()));
    }

    #[tokio::test]
    async fn test_referrer_is_offered_a_slot() {
        let mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));

        // B, C and D all keep A in their tables; A keeps all three in return.
        for id in [B, C, D] {
            assert!(mesh.get(&padded(id)).table().contains(&a.id()));
            assert!(a.table().contains(&padded(id)), "A should know {}", id);
        }
        assert_eq!(a.table().slot(Cell { level: 0, digit: 7 }).len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_through_different_gateways() {
        let mut rng = StdRng::seed_from_u64(0x51c0);
        let mut mesh = Mesh::new();
        for _ in 0..4 {
            mesh.add(Id::random(&mut rng)).await.unwrap();
        }

        let mut joins = Vec::new();
        for i in 0..6 {
            let node = mesh.spawn(Id::random(&mut rng));
            let gateway = mesh.nodes[i % mesh.nodes.len()].local_node().clone();
            joins.push(tokio::spawn(async move {
                node.join(&gateway).await?;
                Ok::<_, OverlayError>(node)
            }));
        }
        for join in joins {
            mesh.nodes.push(join.await.unwrap().unwrap());
        }

        assert_eq!(mesh.nodes.len(), 10);
        assert_global_view(&mesh, &mut rng, 40).await;
    }

    #[tokio::test]
    async fn test_fuzzed_departures_agree_with_global_view() {
        let mut rng = StdRng::seed_from_u64(0x1eaf);
        let mut mesh = Mesh::new();
        for _ in 0..10 {
            mesh.add(Id::random(&mut rng)).await.unwrap();
        }

        for _ in 0..4 {
            let leaving = mesh.nodes[rng.gen_range(0..mesh.nodes.len())].id();
            mesh.leave(&leaving).await;

            for node in &mesh.nodes {
                assert!(!node.table().contains(&leaving));
            }
            assert_global_view(&mesh, &mut rng, 20).await;
        }
    }

    #[tokio::test]
    async fn test_join_with_live_id_is_refused() {
        let mut mesh = reference_mesh().await;

        let result = mesh.add(padded(B)).await;

        assert!(matches!(result, Err(OverlayError::IdInUse(id)) if id == padded(B)));
    }

    #[tokio::test]
    async fn test_notify_leave_is_idempotent() {
        let mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));
        let b = mesh.get(&padded(B));

        for _ in 0..2 {
            let response = b
                .dispatch(Request::NotifyLeave {
                    node: a.local_node().clone(),
                    replacement: None,
                })
                .await
                .unwrap();
            assert!(matches!(response, Response::Ack));
        }

        assert!(!b.table().contains(&a.id()));
        assert!(b.table().contains(&padded(C)));
    }

    #[tokio::test]
    async fn test_notify_leave_adopts_replacement() {
        let mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));
        let c = mesh.get(&padded(C));
        let d = mesh.get(&padded(D));

        a.dispatch(Request::NotifyLeave {
            node: c.local_node().clone(),
            replacement: Some(d.local_node().clone()),
        })
        .await
        .unwrap();

        assert!(!a.table().contains(&c.id()));
        assert!(a.table().contains(&d.id()));
    }

    #[tokio::test]
    async fn test_left_node_refuses_calls() {
        let mut mesh = reference_mesh().await;
        let a = mesh.leave(&padded(A)).await;

        assert!(a.is_stopped());
        assert!(a.table().is_empty());
        assert!(a.backpointers().is_empty());
        assert!(matches!(
            a.dispatch(Request::Ping).await,
            Err(OverlayError::NodeStopped)
        ));

        // Leaving again changes nothing.
        a.leave().await.unwrap();
    }

    // ============================================================
    // FAILURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_routes_around_crashed_node() {
        let mut mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));
        let c = mesh.get(&padded(C));

        mesh.crash(&padded(B));

        let target = padded("70c3");
        let route = a.route(target).await.unwrap();

        assert_eq!(route.root.id, mesh.expected_root(&target));
        assert_eq!(route.root.id, padded(C));
        assert!(!a.table().contains(&padded(B)));
        assert!(!c.table().contains(&padded(B)));
    }

    #[tokio::test]
    async fn test_unreachable_start_fails_resolution() {
        let mut mesh = reference_mesh().await;
        let a = mesh.get(&padded(A));
        let b = mesh.crash(&padded(B));

        let result = a.find_root(b.local_node(), padded("70c3")).await;

        assert!(matches!(result, Err(OverlayError::RootUnreachable(_))));
    }

    #[tokio::test]
    async fn test_probe_evicts_crashed_neighbours() {
        let mut mesh = reference_mesh().await;
        let c = mesh.get(&padded(C));

        mesh.crash(&padded(D));

        assert!(c.table().contains(&padded(D)));
        assert_eq!(c.probe_neighbors().await, 1);
        assert!(!c.table().contains(&padded(D)));
        assert_eq!(c.probe_neighbors().await, 0);
    }

    #[tokio::test]
    async fn test_emptied_slot_is_refilled_after_crashes() {
        let mut mesh = Mesh::new();
        for prefix in ["0000", "1000", "1100", "1200", "1300"] {
            mesh.add(padded(prefix)).await.unwrap();
        }
        let origin = mesh.get(&padded("0000"));
        let survivor = padded("1300");

        // The slot (0,1) of 0000 is full with the three nodes closest to it.
        assert!(!origin.table().contains(&survivor));
        assert!(origin.backpointers().contains(&survivor));

        for prefix in ["1000", "1100", "1200"] {
            mesh.crash(&padded(prefix));
        }

        assert_eq!(origin.probe_neighbors().await, 3);
        assert!(origin.table().contains(&survivor));
        for node in &mesh.nodes {
            node.probe_neighbors().await;
        }

        assert_root_everywhere(&mesh, "1f00", "1300").await;
        assert_root_everywhere(&mesh, "0fff", "0000").await;
        let mut rng = StdRng::seed_from_u64(0x0f11);
        assert_global_view(&mesh, &mut rng, 20).await;
    }

    #[tokio::test]
    async fn test_snapshot_lists_cells() {
        let mesh = reference_mesh().await;
        let b = mesh.get(&padded(B));

        let snapshot = b.snapshot();

        assert_eq!(snapshot.local.id, b.id());
        let listed: usize = snapshot.cells.iter().map(|c| c.nodes.len()).sum();
        assert_eq!(listed, b.table().len());
        assert!(snapshot.cells.windows(2).all(|w| w[0].cell < w[1].cell));
    }
}

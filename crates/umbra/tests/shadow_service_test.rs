//! End-to-end tests through the host hook points.

use crossbeam_channel::unbounded;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use umbra::umbra_core::{ChunkCoord, VoxelChange, VoxelPos, VoxelType, WorldShape};
use umbra::umbra_debug::{
    decode_reveals, ChannelId, ConnectionId, DumpStatus, MaskDump, PermissionLevel,
};
use umbra::{ChunkLifecycleHook, ConnectionHook, OutboundEncodeHook, ShadowService, VoxelChangeHook};

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/shadow.toml");

const DIAMOND: VoxelType = VoxelType(56);
const DEEPSLATE: VoxelType = VoxelType(2);

fn service() -> ShadowService {
    ShadowService::from_file(DEFAULT_CONFIG).unwrap()
}

fn column() -> Vec<VoxelType> {
    vec![VoxelType::STONE; WorldShape::default().voxels_per_chunk()]
}

#[allow(clippy::cast_sign_loss)]
fn put(voxels: &mut [VoxelType], pos: VoxelPos, voxel: VoxelType) {
    let slot = (pos.section_y() - WorldShape::default().min_section) as usize;
    voxels[slot * 4096 + pos.local_index()] = voxel;
}

fn change(service: &ShadowService, pos: VoxelPos, new: VoxelType) {
    let old = service.reader().real_value(pos).unwrap();
    service.on_voxel_change(VoxelChange { pos, old, new });
}

#[test]
fn test_enclosed_ore_stays_revealed_after_refill() {
    let service = service();
    let ore = VoxelPos::new(7, 40, 7);
    let mut voxels = column();
    put(&mut voxels, ore, DIAMOND);
    service.on_chunk_load(ChunkCoord::new(0, 0), &voxels, None).unwrap();

    assert_eq!(service.reader().is_hidden(ore), Some(true));
    assert_eq!(service.voxel_for_client(ore), Some(VoxelType::STONE));

    let neighbour = ore.offset(-1, 0, 0);
    change(&service, neighbour, VoxelType::AIR);
    assert_eq!(service.reader().is_hidden(ore), Some(false));
    assert_eq!(service.voxel_for_client(ore), Some(DIAMOND));

    change(&service, neighbour, VoxelType::STONE);
    assert_eq!(service.reader().is_hidden(ore), Some(false));
    assert_eq!(service.voxel_for_client(ore), Some(DIAMOND));
}

#[test]
fn test_boundary_ore_seeded_from_loaded_neighbour() {
    let service = service();
    let cave = VoxelPos::new(-1, 12, 9);
    let ore = VoxelPos::new(0, 12, 9);

    let mut west = column();
    put(&mut west, cave, VoxelType::AIR);
    service.on_chunk_load(ChunkCoord::new(-1, 0), &west, None).unwrap();

    let mut east = column();
    put(&mut east, ore, DIAMOND);
    let report = service.on_chunk_load(ChunkCoord::new(0, 0), &east, None).unwrap();

    assert_eq!(report.hidden, 0);
    assert_eq!(service.reader().is_hidden(ore), Some(false));
    assert_eq!(service.voxel_for_client(ore), Some(DIAMOND));
}

#[test]
fn test_all_revealed_dump_has_no_mask_bodies() {
    let service = service();
    service.on_chunk_load(ChunkCoord::new(0, 0), &column(), None).unwrap();

    let (tx, rx) = unbounded();
    assert!(service.on_join(ConnectionId(4), &[ChannelId::UPDATE.as_str()], PermissionLevel::ADMIN, tx));
    let status = service.dump(ConnectionId(4), 8.5, 8.5);
    assert_eq!(status, DumpStatus::Sent { chunk: ChunkCoord::new(0, 0), sections: 24 });

    let message = rx.try_recv().unwrap();
    assert_eq!(message.channel, ChannelId::MASK);
    let dump = MaskDump::decode(&message.payload).unwrap();
    assert!(dump.sections.iter().all(Option::is_none));
    assert_eq!(message.payload.len(), 3 + 24);
}

#[test]
fn test_non_observer_dump_ignored() {
    let service = service();
    service.on_chunk_load(ChunkCoord::new(0, 0), &column(), None).unwrap();

    let (tx, rx) = unbounded();
    assert!(!service.on_join(ConnectionId(5), &["umbra-debug:mask"], PermissionLevel::ADMIN, tx));
    assert_eq!(service.dump(ConnectionId(5), 0.0, 0.0), DumpStatus::Ignored);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_strata_pick_disguise() {
    let service = service();
    let deep = VoxelPos::new(3, -30, 3);
    let shallow = VoxelPos::new(3, 30, 3);
    let mut voxels = column();
    put(&mut voxels, deep, DIAMOND);
    put(&mut voxels, shallow, DIAMOND);
    service.on_chunk_load(ChunkCoord::new(0, 0), &voxels, None).unwrap();

    assert_eq!(service.voxel_for_client(deep), Some(DEEPSLATE));
    assert_eq!(service.voxel_for_client(shallow), Some(VoxelType::STONE));
    assert_eq!(service.reader().real_value(deep), Some(DIAMOND));
}

#[test]
fn test_archive_survives_unload() {
    let service = service();
    let coord = ChunkCoord::new(2, 2);
    let ore = VoxelPos::new(40, 0, 40);
    let mut voxels = column();
    put(&mut voxels, ore, DIAMOND);
    service.on_chunk_load(coord, &voxels, None).unwrap();

    change(&service, ore.offset(0, 1, 0), VoxelType::AIR);
    change(&service, ore.offset(0, 1, 0), VoxelType::STONE);
    let archive = service.on_chunk_unload(coord).unwrap();
    assert_eq!(service.voxel_for_client(ore), None);

    let report = service.on_chunk_load(coord, &voxels, Some(&archive)).unwrap();
    assert!(report.archive_applied);
    assert_eq!(service.voxel_for_client(ore), Some(DIAMOND));
}

#[test]
fn test_random_edits_keep_client_view_consistent() {
    let service = service();
    let shape = WorldShape::default();
    let coord = ChunkCoord::new(0, 0);
    let mut rng = ChaCha8Rng::seed_from_u64(41);
    let voxels: Vec<VoxelType> = (0..shape.voxels_per_chunk())
        .map(|_| match rng.gen_range(0..50) {
            0..=4 => DIAMOND,
            5 => VoxelType::AIR,
            _ => VoxelType::STONE,
        })
        .collect();
    service.on_chunk_load(coord, &voxels, None).unwrap();

    let (admin_tx, admin_rx) = unbounded();
    let (player_tx, player_rx) = unbounded();
    let update = [ChannelId::UPDATE.as_str()];
    assert!(service.on_join(ConnectionId(1), &update, PermissionLevel::ADMIN, admin_tx));
    assert!(service.on_join(ConnectionId(2), &update, PermissionLevel::PLAYER, player_tx));

    let mut touched = Vec::new();
    for _ in 0..3000 {
        let pos = VoxelPos::new(
            rng.gen_range(0..16),
            rng.gen_range(shape.min_y()..shape.max_y_exclusive()),
            rng.gen_range(0..16),
        );
        let new = match rng.gen_range(0..3) {
            0 => VoxelType::STONE,
            1 => DIAMOND,
            _ => VoxelType::AIR,
        };
        change(&service, pos, new);
        touched.push(pos);
    }

    let mut broadcast = Vec::new();
    while let Ok(message) = admin_rx.try_recv() {
        broadcast.extend(decode_reveals(&message.payload).unwrap());
    }
    assert!(!broadcast.is_empty());
    assert!(player_rx.try_recv().is_err());
    for pos in &broadcast {
        assert_eq!(service.reader().is_hidden(*pos), Some(false));
    }

    let table = service.engine().policy().disguises();
    let around = touched.iter().flat_map(|p| [p.offset(0, 1, 0), *p, p.offset(0, -1, 0)]);
    for pos in around.filter(|p| p.y >= shape.min_y() && p.y < shape.max_y_exclusive()) {
        let real = service.reader().real_value(pos).unwrap();
        let shown = service.voxel_for_client(pos).unwrap();
        if service.reader().is_hidden(pos).unwrap() {
            assert_eq!(shown, table.disguise_for(real, pos.y), "{pos:?}");
        } else {
            assert_eq!(shown, real, "{pos:?}");
        }
    }
}

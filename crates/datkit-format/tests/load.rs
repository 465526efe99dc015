mod common;

use common::{skeleton, texture, Blob, Body, INFO, SKELETON, TEXTURE, ZONE};
use datkit_common::ResourceId;
use datkit_format::info::MovementType;
use datkit_format::{
    Child, Error, InfoResource, ParseOptions, ResourceGraph, ResourceKind, SkeletonResource,
    TextureResource, ZoneResource,
};
use pretty_assertions::assert_eq;

fn id(tag: &str) -> ResourceId {
    ResourceId::from_tag(tag)
}

fn load(data: &[u8]) -> ResourceGraph {
    ResourceGraph::load(data, &ParseOptions::new("test.dat")).unwrap()
}

#[test]
fn empty_root_directory() {
    let data = Blob::new().dir("ROOT", "").end().build();
    let graph = load(&data);

    let root = graph.root().unwrap();
    assert_eq!(graph.roots().len(), 1);
    assert_eq!(graph.directory(root).id(), id("ROOT"));
    assert!(graph.directory(root).is_empty());
}

#[test]
fn nested_directories_keep_parent_links() {
    let data = Blob::new()
        .dir("ROOT", "characters")
        .dir("ORC ", "orc")
        .frame("BODY", TEXTURE, &texture("orc_body.dds", 0x11))
        .end()
        .dir("ELF ", "elf")
        .end()
        .end()
        .build();
    let graph = load(&data);

    let root = graph.root().unwrap();
    let orc = graph.child_directory(root, id("ORC")).unwrap();
    let elf = graph.child_directory(root, id("ELF")).unwrap();

    assert_eq!(graph.parent(orc), Some(root));
    assert_eq!(graph.parent(elf), Some(root));
    assert_eq!(graph.parent(root), None);
    assert_eq!(graph.directory(orc).name(), Some("orc"));
    assert_eq!(graph.path(orc), "ROOT/ORC ");
    assert_eq!(graph.subdirectories(root), vec![orc, elf]);

    // Every child directory's parent lists it among its children.
    for dir in graph.subdirectories(root) {
        let parent = graph.parent(dir).unwrap();
        assert!(graph.directory(parent).directories().any(|d| d == dir));
    }

    let body = graph.find::<TextureResource>(orc, id("BODY")).unwrap();
    assert_eq!(body.name, "orc_body.dds");
    assert!(body.is_complete());
    assert!(graph.find::<TextureResource>(root, id("BODY")).is_none());
}

#[test]
fn skeleton_self_parent_is_root() {
    let body = skeleton(
        &[(0, [0.0, 0.0, 0.0]), (0, [0.0, 1.0, 0.0]), (1, [0.0, 0.5, 0.0])],
        &[("FOOT", 0, [0.0, 0.0, 0.0]), ("HEAD", 2, [0.0, 0.25, 0.0])],
    );
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("SKEL", SKELETON, &body)
        .end()
        .build();
    let graph = load(&data);

    let skeleton = graph
        .find::<SkeletonResource>(graph.root().unwrap(), id("SKEL"))
        .unwrap();
    assert_eq!(skeleton.joints[0].parent, None);
    assert_eq!(skeleton.joints[1].parent, Some(0));
    assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
    assert_eq!(skeleton.height, Some(1.75));
}

#[test]
fn short_decoders_do_not_desync_framing() {
    // The info decoder reads a few bytes of a much larger section, and the
    // unknown section is skipped whole.
    let info = Body::new()
        .u8(1)
        .u8(0)
        .u8(0)
        .u8(0)
        .f32(0.0)
        .u8(0xFF)
        .u8(1)
        .u16(0)
        .f32(1.0)
        .u32(u32::MAX)
        .zeros(200)
        .build();
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("BAT ", INFO, &info)
        .frame("JUNK", 0x55, &[0xAB; 100])
        .frame("TEX ", TEXTURE, &texture("bat.dds", 7))
        .end()
        .build();
    let graph = load(&data);
    let root = graph.root().unwrap();

    match graph.find::<InfoResource>(root, id("BAT")) {
        Some(InfoResource::Character(c)) => assert_eq!(c.movement_type, MovementType::Fly),
        other => panic!("expected character info, got {other:?}"),
    }
    assert!(graph.find::<TextureResource>(root, id("TEX")).is_some());
    assert_eq!(graph.directory(root).len(), 2);
}

#[test]
fn collect_walks_subdirectories() {
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("GRAS", TEXTURE, &texture("grass.dds", 1))
        .dir("SUB ", "")
        .frame("ROCK", TEXTURE, &texture("rock.dds", 2))
        .end()
        .end()
        .build();
    let graph = load(&data);
    let root = graph.root().unwrap();

    let names: Vec<&str> = graph
        .collect::<TextureResource>(root)
        .into_iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, vec!["grass.dds", "rock.dds"]);
    assert_eq!(graph.collect_kind(root, ResourceKind::Skeleton).len(), 0);

    let sub = graph.child_directory(root, id("SUB")).unwrap();
    assert_eq!(graph.find_texture(sub, "GRASS.DDS").map(|t| t.id), Some(id("GRAS")));
}

#[test]
fn blobs_merge_into_one_graph() {
    let first = Blob::new()
        .dir("ROOT", "world")
        .dir("AREA", "")
        .frame("TEX1", TEXTURE, &texture("a.dds", 1))
        .end()
        .end()
        .build();
    let second = Blob::new()
        .dir("ROOT", "")
        .dir("AREA", "")
        .frame("TEX2", TEXTURE, &texture("b.dds", 2))
        .end()
        .dir("MORE", "")
        .end()
        .end()
        .build();

    let options = ParseOptions::new("merge.dat");
    let mut graph = ResourceGraph::new();
    let a = graph.load_into(&first, &options).unwrap();
    let b = graph.load_into(&second, &options).unwrap();

    assert_eq!(a, b);
    assert_eq!(graph.roots().len(), 1);
    assert_eq!(graph.directory_count(), 3);

    let root = graph.root().unwrap();
    assert_eq!(graph.directory(root).name(), Some("world"));
    let area = graph.child_directory(root, id("AREA")).unwrap();
    assert!(graph.find::<TextureResource>(area, id("TEX1")).is_some());
    assert!(graph.find::<TextureResource>(area, id("TEX2")).is_some());
}

#[test]
fn later_resource_replaces_earlier() {
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("TEX ", TEXTURE, &texture("old.dds", 1))
        .frame("TEX ", TEXTURE, &texture("new.dds", 2))
        .end()
        .build();
    let graph = load(&data);
    let root = graph.root().unwrap();

    assert_eq!(graph.directory(root).len(), 1);
    match graph.directory(root).child(ResourceKind::Texture, id("TEX")) {
        Some(Child::Resource(r)) => assert_eq!(r.id(), id("TEX")),
        other => panic!("expected a texture, got {other:?}"),
    }
    let tex = graph.find::<TextureResource>(root, id("TEX")).unwrap();
    assert_eq!(tex.name, "new.dds");
}

#[test]
fn decoder_errors_carry_context() {
    let bad = Body::new().u8(1).u8(32).u16(4).u16(4).u16(1).tag("DXT9").build();
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("BAD ", TEXTURE, &bad)
        .end()
        .build();

    let err = ResourceGraph::load(&data, &ParseOptions::new("broken.dat")).unwrap_err();
    match err {
        Error::Section {
            resource,
            tag,
            type_code,
            position,
            source,
        } => {
            assert_eq!(resource, "broken.dat");
            assert_eq!(tag, id("BAD"));
            assert_eq!(type_code, TEXTURE);
            assert_eq!(position, 32);
            assert!(matches!(*source, Error::UnknownCompression(_)));
        }
        other => panic!("expected a section error, got {other:?}"),
    }
}

#[test]
fn unbalanced_end_is_fatal() {
    let data = Blob::new().dir("ROOT", "").end().end().build();
    assert!(matches!(
        ResourceGraph::load(&data, &ParseOptions::new("x.dat")),
        Err(Error::MalformedContainer { .. })
    ));
}

/// One floor triangle covering x + z <= 100 at y = 3.
fn zone_body() -> Vec<u8> {
    Body::new()
        // Definition header: collision at 28, everything else absent.
        .u32(0)
        .u32(0)
        .u32(0)
        .u32(0)
        .u32(0)
        .u32(0)
        .u32(28)
        // Collision header, 1x1 grid of 200-unit cells from (-100, -100).
        .u32(1)
        .u32(1)
        .u32(1)
        .u32(1)
        .f32(200.0)
        .f32(-100.0)
        .f32(-100.0)
        .u32(1)
        .u32(68)
        .u32(184)
        // Group table @68, group @72, transform @84, mesh @132, grid @184.
        .u32(72)
        .u32(1)
        .u32(84)
        .u32(132)
        .f32s(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
        .u32(3)
        .u32(1)
        .f32s(&[0.0, 3.0, 0.0, 0.0, 3.0, 100.0, 100.0, 3.0, 0.0])
        .u16(0)
        .u16(1)
        .u16(2)
        .u8(1)
        .u8(0)
        .u32(72)
        .build()
}

#[test]
fn zone_ground_query() {
    let data = Blob::new()
        .dir("ROOT", "")
        .frame("ZONE", ZONE, &zone_body())
        .end()
        .build();
    let graph = load(&data);

    let zones = graph.collect::<ZoneResource>(graph.root().unwrap());
    assert_eq!(zones.len(), 1);
    let zone = zones[0];

    assert_eq!(zone.ground_height(10.0, 20.0), Some(3.0));
    assert_eq!(zone.ground_height_from(10.0, 2.0, 20.0), None);
    assert_eq!(zone.ground_height(90.0, 90.0), None);
    assert_eq!(zone.ground_height(-500.0, 0.0), None);
}

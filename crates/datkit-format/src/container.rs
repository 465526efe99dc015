//! Container framing and directory assembly.
//!
//! A blob is decoded in two phases. First every obfuscated section body is
//! handed to the [`Deobfuscate`](crate::Deobfuscate) collaborator on a
//! private copy of the buffer. Then frames are read one at a time, each body
//! is decoded through a cursor that cannot see past the section end, and the
//! result drives the directory stack.

use std::borrow::Cow;

use datkit_common::{ByteCursor, ByteScrambler};

use crate::graph::{DirId, ResourceGraph};
use crate::options::ParseOptions;
use crate::resource::{DirectoryHeader, Resource};
use crate::section::{SectionAction, SectionHeader, SectionType};
use crate::{
    animation, environment, info, skeleton, skeleton_mesh, texture, weighted_mesh, zone, Error,
    Result,
};

/// Signature shared by every section decoder.
///
/// The cursor starts at `header.data_start()` and ends at `header.end()`;
/// positions are absolute buffer offsets.
pub(crate) type Decoder =
    fn(&mut ByteCursor<'_>, &SectionHeader, &ParseOptions) -> Result<Option<Resource>>;

/// Pick the decoder for a section type. Unknown types decode to nothing.
fn decoder_for(section_type: SectionType) -> Decoder {
    match section_type {
        SectionType::Directory => decode_directory,
        SectionType::End => skip,
        SectionType::Texture => texture::decode,
        SectionType::Skeleton => skeleton::decode,
        SectionType::SkeletonMesh => skeleton_mesh::decode,
        SectionType::SkeletonAnimation => animation::decode,
        SectionType::WeightedMesh => weighted_mesh::decode,
        SectionType::ZoneDefinition => zone::decode_definition,
        SectionType::ZoneMesh => zone::decode_mesh,
        SectionType::Environment => environment::decode,
        SectionType::Info => info::decode,
        SectionType::Unknown(_) => skip,
    }
}

fn skip(_: &mut ByteCursor<'_>, _: &SectionHeader, _: &ParseOptions) -> Result<Option<Resource>> {
    Ok(None)
}

fn decode_directory(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _: &ParseOptions,
) -> Result<Option<Resource>> {
    let name = cursor.read_cstring(header.end());
    Ok(Some(Resource::Directory(DirectoryHeader {
        id: header.tag(),
        name: (!name.is_empty()).then_some(name),
    })))
}

/// Decode `data` into `graph`. Returns the blob's root directory.
pub(crate) fn parse(
    graph: &mut ResourceGraph,
    data: &[u8],
    options: &ParseOptions,
) -> Result<Option<DirId>> {
    let bytes = deobfuscate(data, options)?;
    let data: &[u8] = &bytes;

    let mut assembler = DirectoryAssembler::new(graph, &options.resource_name);
    let mut cursor = ByteCursor::new(data);

    while let Some(header) = SectionHeader::read(&mut cursor) {
        let section_type = header.section_type();
        tracing::debug!(
            tag = %header.tag(),
            section = %section_type,
            start = header.start(),
            size = header.section_size(),
            "section"
        );
        if let SectionType::Unknown(code) = section_type {
            tracing::trace!(tag = %header.tag(), code, "skipping unknown section");
        }

        let end = header.end().min(data.len());
        let mut body = ByteCursor::new_at(&data[..end], header.data_start());
        let decoded = decoder_for(section_type)(&mut body, &header, options)
            .map_err(|e| section_error(options, &header, e))?;

        match section_type.action() {
            SectionAction::Push => match decoded {
                Some(Resource::Directory(dir)) => assembler.push(&header, dir)?,
                _ => {
                    let reason = "directory section did not yield a directory";
                    return Err(assembler.malformed(&header, reason));
                }
            },
            SectionAction::Pop => assembler.pop(&header)?,
            SectionAction::Attach => {
                if let Some(resource) = decoded {
                    assembler.attach(&header, resource)?;
                }
            }
        }

        cursor.seek(header.end());
    }

    Ok(assembler.finish())
}

/// Run the deobfuscation pre-pass.
///
/// The input is borrowed unchanged unless some section is both obfuscated
/// and handled by a non-identity collaborator.
fn deobfuscate<'a>(data: &'a [u8], options: &ParseOptions) -> Result<Cow<'a, [u8]>> {
    if options.deobfuscator.is_identity() {
        return Ok(Cow::Borrowed(data));
    }

    let mut owned: Option<Vec<u8>> = None;
    let mut cursor = ByteCursor::new(data);

    while let Some(header) = SectionHeader::read(&mut cursor) {
        if header.section_type().is_obfuscated() {
            let buf = owned.get_or_insert_with(|| data.to_vec());
            let end = header.end().min(buf.len());
            let start = header.data_start().min(end);
            let mut body = ByteScrambler::new(&mut buf[start..end]);
            options
                .deobfuscator
                .deobfuscate(&header, &mut body)
                .map_err(|e| match e {
                    Error::Deobfuscation(_) => e,
                    other => Error::Deobfuscation(other.to_string()),
                })
                .map_err(|e| section_error(options, &header, e))?;
        }
        cursor.seek(header.end());
    }

    Ok(owned.map_or(Cow::Borrowed(data), Cow::Owned))
}

fn section_error(options: &ParseOptions, header: &SectionHeader, source: Error) -> Error {
    Error::Section {
        resource: options.resource_name.clone(),
        tag: header.tag(),
        type_code: header.type_code(),
        position: header.start(),
        source: Box::new(source),
    }
}

/// The push/pop stack machine that files decoded resources into the graph.
struct DirectoryAssembler<'g> {
    graph: &'g mut ResourceGraph,
    resource_name: &'g str,
    current: Option<DirId>,
    root: Option<DirId>,
}

impl<'g> DirectoryAssembler<'g> {
    fn new(graph: &'g mut ResourceGraph, resource_name: &'g str) -> Self {
        Self {
            graph,
            resource_name,
            current: None,
            root: None,
        }
    }

    fn malformed(&self, header: &SectionHeader, reason: impl Into<String>) -> Error {
        Error::MalformedContainer {
            resource: self.resource_name.to_string(),
            position: header.start(),
            reason: reason.into(),
        }
    }

    fn push(&mut self, header: &SectionHeader, dir: DirectoryHeader) -> Result<()> {
        if self.current.is_none() {
            if let Some(root) = self.root {
                if self.graph.directory(root).id() != dir.id {
                    return Err(self.malformed(
                        header,
                        format!(
                            "second root {} after {}",
                            dir.id,
                            self.graph.directory(root).id()
                        ),
                    ));
                }
            }
        }

        let opened = self.graph.open_directory(self.current, dir);
        if self.current.is_none() {
            self.root = Some(opened);
        }
        self.current = Some(opened);
        Ok(())
    }

    fn pop(&mut self, header: &SectionHeader) -> Result<()> {
        match self.current {
            Some(dir) => {
                self.current = self.graph.parent(dir);
                Ok(())
            }
            None => Err(self.malformed(header, "end of scope with no open directory")),
        }
    }

    fn attach(&mut self, header: &SectionHeader, resource: Resource) -> Result<()> {
        match self.current {
            Some(dir) => {
                self.graph.attach(dir, resource);
                Ok(())
            }
            None => Err(self.malformed(
                header,
                format!("{} {} before any directory", resource.kind(), resource.id()),
            )),
        }
    }

    fn finish(self) -> Option<DirId> {
        if let Some(dir) = self.current {
            let mut open = 0usize;
            let mut walk = Some(dir);
            while let Some(d) = walk {
                open += 1;
                walk = self.graph.parent(d);
            }
            tracing::warn!(
                resource = self.resource_name,
                open,
                "buffer ended with directories still open"
            );
        }
        self.root
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datkit_common::ResourceId;

    use super::*;
    use crate::options::Deobfuscate;
    use crate::resource::ResourceKind;
    use crate::test_support::{blob, frame};

    fn load(data: &[u8]) -> Result<ResourceGraph> {
        ResourceGraph::load(data, &ParseOptions::new("test.dat"))
    }

    #[test]
    fn test_single_empty_root() {
        let mut data = blob(&[frame("ROOT", 0x01, &[]), frame("END ", 0x00, &[])]);
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(data.len(), 48);

        let graph = load(&data).unwrap();
        assert_eq!(graph.roots().len(), 1);
        let root = graph.root().unwrap();
        assert!(graph.directory(root).is_empty());
        assert_eq!(graph.directory(root).id(), ResourceId::from_tag("ROOT"));
        assert_eq!(graph.directory_count(), 1);
    }

    #[test]
    fn test_directory_name() {
        let data = blob(&[frame("ROOT", 0x01, b"world\0"), frame("END ", 0x00, &[])]);
        let graph = load(&data).unwrap();
        assert_eq!(graph.directory(graph.root().unwrap()).name(), Some("world"));
    }

    #[test]
    fn test_pop_without_scope_is_fatal() {
        let data = frame("END ", 0x00, &[]);
        let err = load(&data).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer { position: 0, .. }));
    }

    #[test]
    fn test_resource_before_root_is_fatal() {
        let env = vec![0u8; 200];
        let data = frame("ENVR", 0x09, &env);
        let err = load(&data).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer { .. }));
        assert!(err.to_string().contains("test.dat"));
    }

    #[test]
    fn test_second_root_is_fatal() {
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("END ", 0x00, &[]),
            frame("OTHR", 0x01, &[]),
        ]);
        assert!(matches!(load(&data), Err(Error::MalformedContainer { position: 32, .. })));
    }

    #[test]
    fn test_reopen_same_root() {
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("AAAA", 0x01, &[]),
            frame("END ", 0x00, &[]),
            frame("END ", 0x00, &[]),
            frame("ROOT", 0x01, &[]),
            frame("AAAA", 0x01, &[]),
            frame("BBBB", 0x01, &[]),
            frame("END ", 0x00, &[]),
            frame("END ", 0x00, &[]),
            frame("END ", 0x00, &[]),
        ]);
        let graph = load(&data).unwrap();
        let root = graph.root().unwrap();
        let a = graph.child_directory(root, ResourceId::from_tag("AAAA")).unwrap();
        assert!(graph.child_directory(a, ResourceId::from_tag("BBBB")).is_some());
        assert_eq!(graph.directory_count(), 3);
    }

    #[test]
    fn test_unknown_sections_are_skipped() {
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("WHAT", 0x55, &[0xAA; 40]),
            frame("END ", 0x00, &[]),
        ]);
        let graph = load(&data).unwrap();
        assert!(graph.directory(graph.root().unwrap()).is_empty());
    }

    #[test]
    fn test_open_scope_at_end_is_tolerated() {
        let data = blob(&[frame("ROOT", 0x01, &[]), frame("AAAA", 0x01, &[])]);
        let graph = load(&data).unwrap();
        assert_eq!(graph.directory_count(), 2);
    }

    #[test]
    fn test_decoder_error_carries_context() {
        // Info section with movement type 9.
        let mut body = vec![9u8];
        body.resize(24, 0);
        let data = blob(&[frame("ROOT", 0x01, &[]), frame("INFO", 0x0A, &body)]);

        match load(&data).unwrap_err() {
            Error::Section {
                resource,
                tag,
                type_code,
                position,
                source,
            } => {
                assert_eq!(resource, "test.dat");
                assert_eq!(tag, ResourceId::from_tag("INFO"));
                assert_eq!(type_code, 0x0A);
                assert_eq!(position, 16);
                assert!(matches!(*source, Error::UnknownMovementType(9)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Invert;

    impl Deobfuscate for Invert {
        fn deobfuscate(&self, _: &SectionHeader, body: &mut ByteScrambler<'_>) -> Result<()> {
            while !body.is_empty() {
                body.xor_byte(0xFF);
            }
            Ok(())
        }
    }

    #[test]
    fn test_deobfuscation_only_touches_zone_sections() {
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("ZMSH", 0x08, &[0u8; 32]),
            frame("END ", 0x00, &[]),
        ]);
        let options = ParseOptions::new("zone.dat").with_deobfuscator(Arc::new(Invert));

        let out = deobfuscate(&data, &options).unwrap();
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(&out[..16], &data[..16]);
        assert!(out[32..64].iter().all(|&b| b == 0xFF));
        assert_eq!(&out[64..], &data[64..]);
    }

    struct SwapPastEnd;

    impl Deobfuscate for SwapPastEnd {
        fn deobfuscate(&self, _: &SectionHeader, body: &mut ByteScrambler<'_>) -> Result<()> {
            body.seek(body.len() - 1);
            body.swap_with_offset(1)?;
            Ok(())
        }
    }

    #[test]
    fn test_deobfuscation_failure_is_reported() {
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("ZMSH", 0x08, &[0u8; 32]),
            frame("END ", 0x00, &[]),
        ]);
        let options = ParseOptions::new("zone.dat").with_deobfuscator(Arc::new(SwapPastEnd));

        match ResourceGraph::load(&data, &options) {
            Err(Error::Section {
                tag,
                position,
                source,
                ..
            }) => {
                assert_eq!(tag, ResourceId::from_tag("ZMSH"));
                assert_eq!(position, 16);
                assert!(matches!(*source, Error::Deobfuscation(_)));
            }
            other => panic!("expected a deobfuscation error, got {other:?}"),
        }
    }

    #[test]
    fn test_plaintext_borrows() {
        let data = blob(&[frame("ROOT", 0x01, &[]), frame("END ", 0x00, &[])]);
        let out = deobfuscate(&data, &ParseOptions::default()).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_attach_kind() {
        let mut env = Vec::new();
        env.resize(200, 0);
        let data = blob(&[
            frame("ROOT", 0x01, &[]),
            frame("ENVR", 0x09, &env),
            frame("END ", 0x00, &[]),
        ]);
        let graph = load(&data).unwrap();
        let root = graph.root().unwrap();
        assert!(graph
            .get(root, ResourceKind::Environment, ResourceId::from_tag("ENVR"))
            .is_some());
    }
}

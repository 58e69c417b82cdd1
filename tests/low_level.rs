//! Integration tests for low-level attribute walks.

mod common;

use common::{open, Attr, Layout, PackageBuilder, Value};
use hpkg::{format::TagLayout, prelude::*};

/// One node of a reconstructed attribute tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    id: u8,
    data: AttributeData,
    parent: Option<LowLevelToken>,
    done: bool,
}

/// Rebuilds the attribute trees from the raw events.
#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Node>,
    sections: Vec<(SectionId, bool)>,
    skip: Vec<SectionId>,
}

impl LowLevelPackageHandler for TreeBuilder {
    fn handle_section_start(&mut self, section: SectionId) -> Result<bool> {
        self.sections.push((section, false));
        Ok(self.skip.contains(&section))
    }

    fn handle_section_end(&mut self, section: SectionId) -> Result<()> {
        self.sections.push((section, true));
        Ok(())
    }

    fn handle_attribute(
        &mut self,
        id: u8,
        value: &AttributeValue,
        parent: Option<LowLevelToken>,
    ) -> Result<LowLevelToken> {
        self.nodes.push(Node {
            id,
            data: value.data.clone(),
            parent,
            done: false,
        });
        Ok(LowLevelToken(self.nodes.len() as u64 - 1))
    }

    fn handle_attribute_done(
        &mut self,
        id: u8,
        _value: &AttributeValue,
        parent: Option<LowLevelToken>,
        token: LowLevelToken,
    ) -> Result<()> {
        let node = &mut self.nodes[token.0 as usize];
        assert_eq!(node.id, id);
        assert_eq!(node.parent, parent);
        assert!(!node.done);
        node.done = true;
        Ok(())
    }
}

fn package(layout: Layout) -> PackageBuilder {
    PackageBuilder::new()
        .with_layout(layout)
        .with_attribute(Attr::string(15, "example"))
        .with_attribute(
            Attr::string(29, "haiku")
                .with_child(Attr::uint(34, 4))
                .with_child(Attr::string(22, "r1").with_child(Attr::uint(25, 3))),
        )
        // Unknown ids reach low-level handlers as well
        .with_attribute(Attr::new(100, Value::Int(-5)))
        .with_toc(Attr::string(0, "bin").with_child(Attr::uint(1, 1)))
}

fn options(layout: Layout) -> ReaderOptions {
    ReaderOptions::default().with_tag_layout(match layout {
        Layout::Composed => TagLayout::Composed,
        Layout::Split => TagLayout::Split,
    })
}

#[test]
fn test_tree_reconstruction() -> Result<()> {
    for layout in [Layout::Composed, Layout::Split] {
        let (mut reader, output) = open(package(layout).build(), options(layout))?;
        let mut tree = TreeBuilder::default();
        reader.parse_content_low_level(&mut tree)?;

        let ids: Vec<u8> = tree.nodes.iter().map(|node| node.id).collect();
        assert_eq!(ids, vec![15, 29, 34, 22, 25, 100, 0, 1], "{layout:?}");

        let parents: Vec<Option<u64>> = tree
            .nodes
            .iter()
            .map(|node| node.parent.map(|token| token.0))
            .collect();
        assert_eq!(
            parents,
            vec![None, None, Some(1), Some(1), Some(3), None, None, Some(6)]
        );

        assert!(tree.nodes.iter().all(|node| node.done));
        assert_eq!(tree.nodes[0].data, AttributeData::String("example".to_string()));
        assert_eq!(tree.nodes[2].data, AttributeData::Uint(4));
        assert_eq!(tree.nodes[5].data, AttributeData::Int(-5));

        assert_eq!(
            tree.sections,
            vec![
                (SectionId::PackageAttributes, false),
                (SectionId::PackageAttributes, true),
                (SectionId::Toc, false),
                (SectionId::Toc, true),
            ]
        );
        assert_eq!(reader.state(), ReaderState::AttributesParsed);
        assert!(output.messages().is_empty());
    }
    Ok(())
}

#[test]
fn test_skip_sections() -> Result<()> {
    let (mut reader, _) = open(package(Layout::Composed).build(), ReaderOptions::default())?;
    let mut tree = TreeBuilder {
        skip: vec![SectionId::PackageAttributes],
        ..TreeBuilder::default()
    };
    reader.parse_content_low_level(&mut tree)?;

    let ids: Vec<u8> = tree.nodes.iter().map(|node| node.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(reader.state(), ReaderState::AttributesParsed);

    let (mut reader, _) = open(package(Layout::Composed).build(), ReaderOptions::default())?;
    let mut tree = TreeBuilder {
        skip: vec![SectionId::Toc],
        ..TreeBuilder::default()
    };
    reader.parse_content_low_level(&mut tree)?;
    assert_eq!(tree.nodes.len(), 6);
    assert_eq!(tree.sections.last(), Some(&(SectionId::Toc, false)));
    Ok(())
}

#[test]
fn test_layout_mismatch() -> Result<()> {
    // A split stream read as composed tags fails instead of yielding garbage
    let (mut reader, output) = open(package(Layout::Split).build(), ReaderOptions::default())?;
    let error = reader
        .parse_content_low_level(&mut TreeBuilder::default())
        .unwrap_err();

    assert!(error.is_bad_data() || matches!(error, Error::OutOfBounds));
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_eq!(reader.attribute_handler_depth(), 0);
    assert_eq!(output.messages().len(), 1);
    Ok(())
}

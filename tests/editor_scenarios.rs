// End-to-end editing scenarios: stored HTML in, editors over a DocumentHost, HTML out

use std::env;
use std::fs;
use std::time::{Duration, Instant};

use draft_editor::DraftResult;
use draft_editor::config::EditorConfig;
use draft_editor::editor::{
    ColorBoxEditor, DocumentHost, EditFinish, EditHost, EditOutcome, ImageBlockEditor, VideoBlockEditor,
};
use draft_editor::error::QueryError;
use draft_editor::media::{ImageItem, InMemoryLibrary, MediaPage, MediaQuery, MediaSource, VideoItem};
use draft_editor::render::render_document;
use draft_editor::richtext::content_document::ContentDocument;
use draft_editor::richtext::entity::{Alignment, EntityData, EntityKey, IMAGE_TYPE};
use draft_editor::richtext::html_converter::{document_to_html, html_to_document};
use draft_editor::richtext::raw::document_to_raw;
use draft_editor::selector::{Selector, SelectorConfig, SelectorOutcome, SelectorState};
use draft_editor::store::DocumentStore;
use pretty_assertions::assert_eq;

const STORED: &str = concat!(
    "<p>Intro</p>",
    r#"<figure data-entity-type="color-box" data-entity-key="e1" data-mutability="MUTABLE" "#,
    r#"data-entity-data="{&quot;color&quot;:&quot;#000&quot;,&quot;body&quot;:&quot;&lt;p&gt;old&lt;/p&gt;&quot;}">"#,
    "<p>old</p></figure>",
);

fn image(id: u32, name: &str) -> ImageItem {
    ImageItem {
        id: id.to_string(),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn color_of(doc: &ContentDocument, key: &EntityKey) -> (String, String) {
    match &doc.entities().get(key).unwrap().data {
        EntityData::ColorBox(data) => (data.color.clone(), data.body.clone()),
        other => panic!("expected color box, got {:?}", other),
    }
}

#[test]
fn test_commit_then_cancel_color_box() {
    let key = EntityKey::from("e1");
    let mut host = DocumentHost::new(html_to_document(STORED));
    assert_eq!(color_of(host.document(), &key), ("#000".to_string(), "<p>old</p>".to_string()));

    let EntityData::ColorBox(existing) = host.document().entities().get(&key).unwrap().data.clone() else {
        panic!("expected color box");
    };
    let mut editor = ColorBoxEditor::for_entity(key.clone(), &existing);
    editor.open(&mut host);
    let body = document_to_raw(&ContentDocument::with_paragraph("hi")).unwrap();
    assert_eq!(
        editor.commit(&mut host, "#fff", body).unwrap(),
        EditOutcome::Committed(key.clone())
    );
    assert_eq!(color_of(host.document(), &key), ("#fff".to_string(), "<p>hi</p>".to_string()));

    let mut second = ColorBoxEditor::for_entity(key.clone(), &existing);
    second.open(&mut host);
    assert_eq!(second.cancel(&mut host).unwrap(), EditOutcome::Cancelled);
    assert_eq!(color_of(host.document(), &key), ("#fff".to_string(), "<p>hi</p>".to_string()));

    // the committed state is what gets stored
    let stored = document_to_html(host.document());
    let reloaded = html_to_document(&stored);
    assert_eq!(color_of(&reloaded, &key), ("#fff".to_string(), "<p>hi</p>".to_string()));
    assert_eq!(render_document(&reloaded), vec!["Intro", "[color-box #fff] hi"]);
}

#[test]
fn test_recolor_stored_document_with_configured_history() {
    let dir = env::temp_dir().join("draft-editor-test-recolor");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("page.html"), STORED).unwrap();

    let store = DocumentStore::new(dir.clone());
    let mut stored = store.load("page").unwrap();
    let config = EditorConfig {
        history_limit: 1,
        ..Default::default()
    };
    let key = EntityKey::from("e1");
    let mut host = DocumentHost::from_config(stored.document, &config);

    for color in ["#111", "#222"] {
        let mut editor = ColorBoxEditor::for_entity(key.clone(), &Default::default());
        let body = document_to_raw(&ContentDocument::with_paragraph(color)).unwrap();
        editor.commit(&mut host, color, body).unwrap();
    }
    assert_eq!(host.undo_depth(), 1);

    stored.document = host.into_document();
    store.save(&stored).unwrap();
    let reloaded = store.load("page").unwrap().document;
    assert_eq!(color_of(&reloaded, &key), ("#222".to_string(), "<p>#222</p>".to_string()));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_undo_restores_previous_payload() {
    let key = EntityKey::from("e1");
    let mut host = DocumentHost::new(html_to_document(STORED));

    let mut editor = ColorBoxEditor::for_entity(key.clone(), &Default::default());
    let body = document_to_raw(&ContentDocument::with_paragraph("new")).unwrap();
    editor.commit(&mut host, "#abcdef", body).unwrap();

    assert!(host.undo());
    assert_eq!(color_of(host.document(), &key).0, "#000");
    assert!(!host.undo());
    assert!(host.redo());
    assert_eq!(color_of(host.document(), &key).0, "#abcdef");
}

#[test]
fn test_image_slideshow_flow() {
    let start = Instant::now();
    let library = InMemoryLibrary::new(
        (1..=20)
            .map(|i| image(i, if i % 3 == 0 { "cat" } else { "city" }))
            .collect(),
    );
    let mut host = DocumentHost::new(ContentDocument::with_paragraph("Gallery below"));

    let mut editor = ImageBlockEditor::new(library, SelectorConfig::image().slideshow());
    editor.open(&mut host, start);
    assert!(host.is_editing());
    assert!(editor.run_due(start));
    assert_eq!(editor.selector().total_pages(), 4);

    // typing debounces; only the final text is queried
    editor.selector_mut().set_search_text("c", start);
    editor.selector_mut().set_search_text("ca", start + Duration::from_millis(100));
    editor.selector_mut().set_search_text("cat", start + Duration::from_millis(200));
    assert!(!editor.run_due(start + Duration::from_millis(300)));
    assert!(editor.run_due(start + Duration::from_millis(500)));
    assert_eq!(editor.selector().count(), 6);

    let ids: Vec<String> = editor.selector().results().iter().map(|i| i.id.clone()).collect();
    assert_eq!(ids, vec!["18", "15", "12", "9", "6", "3"]);

    for item in editor.selector().results()[..3].to_vec() {
        editor.selector_mut().toggle(item);
    }
    editor.selector_mut().toggle(image(15, "cat"));
    editor.selector_mut().update_meta("12", "Middle cat", Some("https://example.com/12".to_string()));
    editor.selector_mut().set_alignment(Some(Alignment::Right));
    editor.selector_mut().set_delay("3.5");

    let EditOutcome::Inserted(key) = editor.confirm(&mut host).unwrap() else {
        panic!("expected a new block");
    };
    assert!(!host.is_editing());

    let doc = host.document();
    assert_eq!(doc.block_count(), 2);
    let entity = doc.entities().get(&key).unwrap();
    assert_eq!(entity.data.type_tag(), IMAGE_TYPE);
    let EntityData::Image(data) = &entity.data else {
        panic!("expected image data");
    };
    let picked: Vec<(&str, &str)> = data
        .images
        .iter()
        .map(|m| (m.image.id.as_str(), m.desc.as_str()))
        .collect();
    assert_eq!(picked, vec![("18", ""), ("12", "Middle cat")]);
    assert_eq!(data.alignment, Some(Alignment::Right));
    assert_eq!(data.delay, Some(3.5));

    assert_eq!(
        render_document(doc),
        vec!["Gallery below", "[slideshow x2] cat, cat (right) every 3.5s"]
    );
}

/// Answers every query with a transport failure
struct Offline;

impl MediaSource for Offline {
    type Item = VideoItem;

    fn search(&self, _query: &MediaQuery) -> Result<MediaPage<VideoItem>, QueryError> {
        Err(QueryError::Transport("connection refused".to_string()))
    }
}

#[test]
fn test_video_selector_error_then_cancel() {
    let now = Instant::now();
    let before = html_to_document(STORED);
    let mut host = DocumentHost::new(before.clone());

    let mut editor = VideoBlockEditor::new(Offline, SelectorConfig::video());
    editor.open(&mut host, now);
    editor.run_due(now);

    let SelectorState::Error(diagnostic) = editor.selector().state() else {
        panic!("expected an error state");
    };
    assert!(diagnostic.message.contains("connection refused"));
    assert_eq!(diagnostic.query.take, 6);

    assert_eq!(editor.confirm(&mut host).unwrap(), EditOutcome::Cancelled);
    assert!(host.document().semantic_eq(&before));
    assert!(!host.can_undo());
}

#[test]
fn test_video_selector_is_single_select() {
    let videos = InMemoryLibrary::new(
        (1..=3)
            .map(|i| VideoItem {
                id: format!("v{}", i),
                name: Some(format!("clip {}", i)),
                ..Default::default()
            })
            .collect(),
    );
    let now = Instant::now();
    let mut selector = Selector::new(SelectorConfig::video());
    selector.open(now);
    selector.run_due(now, &videos);

    for item in selector.results().to_vec() {
        selector.toggle(item);
        assert!(selector.selected().len() <= 1);
    }
    let SelectorOutcome::Confirmed { selected, delay, .. } = selector.confirm() else {
        panic!("expected confirmation");
    };
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].item.id, "v1");
    assert_eq!(delay, None);
}

#[test]
fn test_host_sees_one_start_per_opening() {
    struct Counting {
        inner: Option<DocumentHost>,
        starts: usize,
    }

    impl EditHost for Counting {
        fn on_edit_start(&mut self) {
            self.starts += 1;
            if let Some(host) = self.inner.as_mut() {
                host.on_edit_start();
            }
        }

        fn on_edit_finish(&mut self, finish: EditFinish) -> DraftResult<EditOutcome> {
            match self.inner.as_mut() {
                Some(host) => host.on_edit_finish(finish),
                None => Ok(EditOutcome::Cancelled),
            }
        }
    }

    let mut host = Counting {
        inner: Some(DocumentHost::new(ContentDocument::new())),
        starts: 0,
    };
    let mut editor = ColorBoxEditor::new();
    editor.open(&mut host);
    editor.open(&mut host);
    assert_eq!(host.starts, 1);

    editor.cancel(&mut host).unwrap();
    editor.open(&mut host);
    assert_eq!(host.starts, 2);
}

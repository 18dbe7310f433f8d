use std::fs;
use std::path::{Path, PathBuf};

use capigen_core::{ClassifyPolicy, ShapeRule};
use capigen_emit::{generate, EmitError, GenerateOptions, IncrementalWriter, OutputKinds};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample.h")
}

fn options(out: &Path, header: PathBuf) -> GenerateOptions {
    GenerateOptions {
        cpp_header: header,
        capi_header: Some(out.join("include/capi/cef_capi.h")),
        cpptoc_dir: Some(out.join("cpptoc")),
        ctocpp_dir: Some(out.join("ctocpp")),
        ..GenerateOptions::default()
    }
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read output dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Write `text` as a header inside `dir` and return its path.
fn header(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write header");
    path
}

#[test]
fn generates_every_output_for_the_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = options(dir.path(), fixture());

    let report = generate(&opts, &IncrementalWriter::default()).expect("generate");
    assert!(report.is_clean());
    // C header plus four files for each of the five classes.
    assert_eq!(report.files_changed, 21);

    let cpptoc = files_in(&dir.path().join("cpptoc"));
    assert!(cpptoc.contains(&"browser_cpptoc.h".to_string()));
    assert!(cpptoc.contains(&"cookie_visitor_cpptoc.cc".to_string()));
    let ctocpp = files_in(&dir.path().join("ctocpp"));
    assert!(ctocpp.contains(&"tabbed_browser_ctocpp.cc".to_string()));
    assert_eq!(ctocpp.len(), 10);

    let capi = read(dir.path().join("include/capi/cef_capi.h"));
    assert!(capi.contains("CEF_THREAD_ID_TID_FILE = 10,"));
    assert!(capi.contains("typedef struct _cef_rect_t {"));
    assert!(capi.contains("typedef struct _cef_browser_t {"));
    assert!(capi.contains("cef_browser_t base;"));
    assert!(capi.contains("cef_base_scoped_t base;"));
    assert!(capi.contains("CEF_EXPORT struct _cef_browser_t* cef_browser_create_browser(const cef_char_t* url);"));
}

#[test]
fn second_run_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = options(dir.path(), fixture());
    let writer = IncrementalWriter::default();

    generate(&opts, &writer).expect("first run");
    let report = generate(&opts, &writer).expect("second run");
    assert_eq!(report.files_changed, 0);
    assert!(files_in(&dir.path().join("cpptoc")).iter().all(|f| !f.ends_with(".bak")));
}

#[test]
fn changed_class_is_rewritten_with_one_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = read(fixture());
    let path = header(&dir, "sample.h", &original);
    let out = dir.path().join("out");
    let opts = options(&out, path.clone());
    let writer = IncrementalWriter::default();

    generate(&opts, &writer).expect("first run");
    let before = read(out.join("cpptoc/tabbed_browser_cpptoc.h"));

    let edited = original.replace(
        "  virtual int GetTabCount() =0;\n",
        "  virtual int GetTabCount() =0;\n  virtual void CloseTab(int index) =0;\n",
    );
    assert_ne!(edited, original, "fixture edit must apply");
    fs::write(&path, edited).expect("rewrite header");

    let report = generate(&opts, &writer).expect("second run");
    // C header and the four tabbed browser files.
    assert_eq!(report.files_changed, 5);

    let after = read(out.join("cpptoc/tabbed_browser_cpptoc.h"));
    assert!(after.contains("virtual void CloseTab(int index) OVERRIDE;"));

    let backups: Vec<String> = files_in(&out.join("cpptoc"))
        .into_iter()
        .filter(|f| f.starts_with("tabbed_browser_cpptoc.h.") && f.ends_with(".bak"))
        .collect();
    assert_eq!(backups.len(), 1, "backups: {backups:?}");
    assert_eq!(read(out.join("cpptoc").join(&backups[0])), before);
}

#[test]
fn check_mode_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = options(dir.path(), fixture());

    let report = generate(&opts, &IncrementalWriter::new(true, true)).expect("check run");
    assert_eq!(report.files_changed, 21);
    assert!(!dir.path().join("cpptoc").exists());
    assert!(!dir.path().join("include").exists());
}

#[test]
fn unknown_class_filter_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = GenerateOptions {
        classes: vec!["CefBrowser".to_string(), "CefWindow".to_string()],
        ..options(dir.path(), fixture())
    };

    let err = generate(&opts, &IncrementalWriter::default()).unwrap_err();
    assert!(matches!(err, EmitError::Input { .. }));
    assert!(err.to_string().contains("CefWindow"));
    assert!(fs::read_dir(dir.path()).expect("read tempdir").next().is_none());
}

#[test]
fn class_filter_limits_adapters_not_the_c_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = GenerateOptions {
        classes: vec!["CefFrame".to_string()],
        ..options(dir.path(), fixture())
    };

    let report = generate(&opts, &IncrementalWriter::default()).expect("generate");
    assert_eq!(report.files_changed, 5);
    assert_eq!(
        files_in(&dir.path().join("cpptoc")),
        vec!["frame_cpptoc.cc".to_string(), "frame_cpptoc.h".to_string()]
    );
    let capi = read(dir.path().join("include/capi/cef_capi.h"));
    assert!(capi.contains("typedef struct _cef_tabbed_browser_t {"));
}

#[test]
fn output_switches_select_file_kinds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = GenerateOptions {
        capi_header: None,
        outputs: OutputKinds {
            cpptoc_header: true,
            cpptoc_impl: false,
            ctocpp_header: false,
            ctocpp_impl: false,
        },
        ..options(dir.path(), fixture())
    };

    let report = generate(&opts, &IncrementalWriter::default()).expect("generate");
    assert_eq!(report.files_changed, 5);
    assert!(files_in(&dir.path().join("cpptoc")).iter().all(|f| f.ends_with("_cpptoc.h")));
    assert!(!dir.path().join("ctocpp").exists());
    assert!(!dir.path().join("include").exists());
}

#[test]
fn declaration_order_does_not_change_the_c_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = r#"
class CefLabel : public CefBase {
 public:
  virtual CefString GetText() =0;
};
class CefButton : public CefBase {
 public:
  virtual void SetLabel(CefRefPtr<CefLabel> label) =0;
  virtual bool IsPressed() =0;
};
"#;
    let second = r#"
class CefButton : public CefBase {
 public:
  virtual void SetLabel(CefRefPtr<CefLabel> label) =0;
  virtual bool IsPressed() =0;
};
class CefLabel : public CefBase {
 public:
  virtual CefString GetText() =0;
};
"#;
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    generate(&options(&a, header(&dir, "first.h", first)), &IncrementalWriter::default()).expect("first order");
    generate(&options(&b, header(&dir, "second.h", second)), &IncrementalWriter::default()).expect("second order");

    let left = read(a.join("include/capi/cef_capi.h"));
    let right = read(b.join("include/capi/cef_capi.h"));
    assert_eq!(left, right);
    assert!(left.find("struct _cef_button_t;").unwrap() < left.find("struct _cef_label_t;").unwrap());
}

#[test]
fn interface_arrays_adjust_each_element_in_both_adapters() {
    let dir = tempfile::tempdir().expect("tempdir");
    generate(&options(dir.path(), fixture()), &IncrementalWriter::default()).expect("generate");

    let forward = read(dir.path().join("cpptoc/browser_cpptoc.cc"));
    assert!(forward.contains("framesList[i] = CefFrameCToCpp::Wrap(frames[i]);"));
    assert!(forward.contains("frames.push_back(CefFrameCppToC::Wrap(framesList[i]));"));
    assert!(forward.contains("cef_mem_free(framesList);"));

    let reverse = read(dir.path().join("ctocpp/browser_ctocpp.cc"));
    assert!(reverse.contains("framesList.push_back(CefFrameCppToC::Wrap(frames[i]));"));
    assert!(reverse.contains("framesList.push_back(CefFrameCppToC::Wrap((*frames)[i]));"));
    assert!(reverse.contains("(*frames)[i] = CefFrameCToCpp::Wrap(framesList[i]);"));

    let reverse_header = read(dir.path().join("ctocpp/browser_ctocpp.h"));
    assert!(reverse_header.contains("struct _cef_frame_t* get_main_frame_retval_;"));
}

#[test]
fn scoped_classes_cross_by_raw_wrapping() {
    let dir = tempfile::tempdir().expect("tempdir");
    generate(&options(dir.path(), fixture()), &IncrementalWriter::default()).expect("generate");

    let task = read(dir.path().join("cpptoc/task_cpptoc.h"));
    assert!(task.contains("CefCppToCScoped<CefTaskCppToC, CefTask, cef_task_t>"));

    let frame = read(dir.path().join("cpptoc/frame_cpptoc.cc"));
    assert!(frame.contains("cef_task_t* taskStruct = CefTaskCToCpp::WrapRaw(task);"));
    assert!(frame.contains("CefTaskCToCpp::ReleaseRaw(taskStruct);"));
}

const COUNTED: &str = r#"
class CefFrame : public CefBase {
 public:
  virtual int GetId() =0;
};
class CefHost : public CefBase {
 public:
  /*--cef(count=frames:frameCount)--*/
  virtual void PutFrames(const CefRefPtr<CefFrame>* frames, size_t frameCount) =0;
};
"#;

#[test]
fn counted_interface_pointer_is_an_array_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let opts = options(&dir.path().join("out"), header(&dir, "host.h", COUNTED));
    generate(&opts, &IncrementalWriter::default()).expect("generate");

    let forward = read(dir.path().join("out/cpptoc/host_cpptoc.cc"));
    assert!(forward.contains("framesList[i] = CefFrameCToCpp::Wrap(frames[i]);"));
    let reverse = read(dir.path().join("out/ctocpp/host_ctocpp.cc"));
    assert!(reverse.contains("framesList.push_back(CefFrameCppToC::Wrap(frames[i]));"));
}

#[test]
fn interface_first_policy_rejects_counted_pointers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = ClassifyPolicy::new(vec![ShapeRule::Interface, ShapeRule::Struct, ShapeRule::Array])
        .expect("valid policy");
    let out = dir.path().join("out");
    let opts = GenerateOptions {
        policy,
        ..options(&out, header(&dir, "host.h", COUNTED))
    };
    let err = generate(&opts, &IncrementalWriter::default()).unwrap_err();

    assert!(matches!(err, EmitError::Classification(_)), "{err}");
    assert!(err.to_string().contains("PutFrames"), "{err}");
    assert!(err.to_string().contains("frameCount"), "{err}");
    assert!(!out.exists());
}

const BROKEN: &str = r#"
class CefGood : public CefBase {
 public:
  virtual int Get() =0;
};
class CefBad : public CefBase {
 public:
  virtual void Fill(int* out) =0;
};
"#;

#[test]
fn classification_failure_aborts_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let opts = options(&out, header(&dir, "broken.h", BROKEN));

    let err = generate(&opts, &IncrementalWriter::default()).unwrap_err();
    assert!(matches!(err, EmitError::Classification(_)));
    assert!(err.to_string().contains("CefBad::Fill"));
    assert!(!out.exists());
}

#[test]
fn keep_going_skips_the_failing_class_and_c_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let opts = GenerateOptions {
        keep_going: true,
        ..options(&out, header(&dir, "broken.h", BROKEN))
    };

    let report = generate(&opts, &IncrementalWriter::default()).expect("keep-going run");
    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.files_changed, 4);
    assert_eq!(
        files_in(&out.join("cpptoc")),
        vec!["good_cpptoc.cc".to_string(), "good_cpptoc.h".to_string()]
    );
    assert!(!out.join("include").exists());
}

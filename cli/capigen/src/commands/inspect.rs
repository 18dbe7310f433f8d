//! `capigen inspect`: show the parsed model and how each value crosses.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use capigen_core::{
    ClassDef, Classifier, CrossingStrategy, Direction, HeaderModel, MethodCrossings,
    Naming, Ownership,
};
use capigen_emit::generator::{load_model, select_classes};
use capigen_emit::GenerateOptions;

use crate::config::CapigenConfig;

#[derive(Debug, Serialize)]
pub struct ModelReport {
    pub classes: Vec<ClassReport>,
    pub enums: Vec<String>,
    pub structs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub c_struct: String,
    pub ref_counted: bool,
    pub base: Option<String>,
    pub methods: Vec<MethodReport>,
    /// Set when the class cannot be translated.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MethodReport {
    pub name: String,
    /// Struct field, or exported function for static methods.
    pub c_name: String,
    pub is_static: bool,
    /// Declaring ancestor, for inherited methods.
    pub inherited_from: Option<String>,
    pub params: Vec<ParamReport>,
    pub returns: Option<CrossingStrategy>,
}

#[derive(Debug, Serialize)]
pub struct ParamReport {
    pub name: String,
    pub direction: Direction,
    pub ownership: Ownership,
    pub optional: bool,
    pub crossing: CrossingStrategy,
    pub count: Option<String>,
}

/// Run `capigen inspect`.
pub fn run(cpp_header: &Path, format: &str, class: Option<&str>, cwd: &Path) -> Result<()> {
    let config = CapigenConfig::find_and_load(cwd)?
        .map(|(config, _)| config)
        .unwrap_or_default();
    let options = GenerateOptions {
        cpp_header: cpp_header.to_path_buf(),
        classes: class.map(str::to_string).into_iter().collect(),
        policy: config.policy()?,
        emit: config.emit_config(),
        ..GenerateOptions::default()
    };
    let model = load_model(&options).with_context(|| format!("reading {}", cpp_header.display()))?;
    let report = build_report(&model, &options)?;

    match format {
        "text" => print!("{}", render_text(&report)),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => bail!("unknown format '{other}' (expected text or json)"),
    }
    Ok(())
}

pub fn build_report(model: &HeaderModel, options: &GenerateOptions) -> Result<ModelReport> {
    let naming = &options.emit.naming;
    let classifier = Classifier::new(model, options.policy.clone());
    let classes = select_classes(model, &options.classes)?
        .into_iter()
        .map(|class| class_report(&classifier, naming, class))
        .collect();

    Ok(ModelReport {
        classes,
        enums: model.enums().iter().map(|e| e.name.clone()).collect(),
        structs: model.structs().iter().map(|s| s.name.clone()).collect(),
    })
}

fn class_report(classifier: &Classifier<'_>, naming: &Naming, class: &ClassDef) -> ClassReport {
    let mut report = ClassReport {
        name: class.name.clone(),
        c_struct: naming.class_struct(class),
        ref_counted: class.ref_counted,
        base: class.base.clone(),
        methods: Vec::new(),
        error: None,
    };
    match classifier.classify_class(class) {
        Ok(crossings) => {
            report.methods = crossings
                .methods
                .iter()
                .map(|m| method_report(naming, class, m))
                .collect();
        }
        Err(e) => report.error = Some(e.to_string()),
    }
    report
}

fn method_report(naming: &Naming, class: &ClassDef, m: &MethodCrossings<'_>) -> MethodReport {
    let c_name = if m.method.is_static {
        naming.creation_function(class, m.method)
    } else {
        naming.method_field(m.method)
    };
    MethodReport {
        name: m.method.name.clone(),
        c_name,
        is_static: m.method.is_static,
        inherited_from: m.is_inherited(class).then(|| m.owner.name.clone()),
        params: m
            .params
            .iter()
            .map(|p| ParamReport {
                name: p.param.name.clone(),
                direction: p.param.direction,
                ownership: p.param.ownership,
                optional: p.param.optional,
                crossing: p.crossing.clone(),
                count: p.count.map(|c| c.name.clone()),
            })
            .collect(),
        returns: m.ret.clone(),
    }
}

pub fn render_text(report: &ModelReport) -> String {
    let mut out = String::new();
    for class in &report.classes {
        let kind = if class.ref_counted { "ref-counted" } else { "scoped" };
        let _ = write!(out, "class {} ({kind}) -> {}", class.name, class.c_struct);
        if let Some(base) = &class.base {
            let _ = write!(out, " : {base}");
        }
        out.push('\n');
        if let Some(error) = &class.error {
            let _ = writeln!(out, "  error: {error}");
            continue;
        }
        for method in &class.methods {
            let returns = method
                .returns
                .as_ref()
                .map_or_else(|| "void".to_string(), ToString::to_string);
            let marker = if method.is_static { "static " } else { "" };
            let _ = write!(out, "  {marker}{} [{}] -> {returns}", method.name, method.c_name);
            if let Some(owner) = &method.inherited_from {
                let _ = write!(out, " (from {owner})");
            }
            out.push('\n');
            for p in &method.params {
                let _ = write!(out, "    {}: {} {:?} {:?}", p.name, p.crossing, p.direction, p.ownership);
                if p.optional {
                    out.push_str(" optional");
                }
                if let Some(count) = &p.count {
                    let _ = write!(out, " count={count}");
                }
                out.push('\n');
            }
        }
    }
    if !report.enums.is_empty() {
        let _ = writeln!(out, "enums: {}", report.enums.join(", "));
    }
    if !report.structs.is_empty() {
        let _ = writeln!(out, "structs: {}", report.structs.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use capigen_core::{parse_header, ClassifyPolicy, ParseOptions};

    const HEADER: &str = r#"
enum CefThreadId { TID_UI, TID_FILE };

class CefFrame : public CefBase {
 public:
  virtual CefString GetName() =0;
};

class CefBrowser : public CefBase {
 public:
  virtual void LoadFrames(const std::vector<CefRefPtr<CefFrame> >& frames) =0;
  /*--cef(optional_param=name)--*/
  virtual int Find(const CefString& name, int offset) =0;
};
"#;

    fn options(classes: &[&str]) -> GenerateOptions {
        GenerateOptions {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            policy: ClassifyPolicy::default(),
            ..GenerateOptions::default()
        }
    }

    fn model() -> HeaderModel {
        parse_header(HEADER, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn report_lists_crossings_per_parameter() {
        let model = model();
        let report = build_report(&model, &options(&[])).unwrap();
        assert_eq!(report.classes.len(), 2);
        assert_eq!(report.enums, vec!["CefThreadId".to_string()]);

        let browser = &report.classes[0];
        assert_eq!(browser.name, "CefBrowser");
        assert_eq!(browser.c_struct, "cef_browser_t");
        assert!(browser.error.is_none());

        let find = browser.methods.iter().find(|m| m.name == "Find").unwrap();
        assert_eq!(find.c_name, "find");
        assert_eq!(find.params[0].crossing, CrossingStrategy::String);
        assert!(find.params[0].optional);
        assert!(matches!(find.returns, Some(CrossingStrategy::Primitive { .. })));

        let load = browser.methods.iter().find(|m| m.name == "LoadFrames").unwrap();
        assert_eq!(load.params[0].crossing.kind(), "InterfaceArray");
    }

    #[test]
    fn class_filter_narrows_the_report() {
        let model = model();
        let report = build_report(&model, &options(&["CefFrame"])).unwrap();
        assert_eq!(report.classes.len(), 1);
        assert_eq!(report.classes[0].name, "CefFrame");

        assert!(build_report(&model, &options(&["CefMissing"])).is_err());
    }

    #[test]
    fn text_and_json_renderings() {
        let model = model();
        let report = build_report(&model, &options(&["CefFrame"])).unwrap();

        let text = render_text(&report);
        assert!(text.starts_with("class CefFrame (ref-counted) -> cef_frame_t\n"));
        assert!(text.contains("  GetName [get_name] -> String\n"));
        assert!(text.contains("enums: CefThreadId"));

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["classes"][0]["methods"][0]["returns"]["strategy"], "string");
    }
}

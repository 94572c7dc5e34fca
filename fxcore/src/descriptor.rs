//! Region descriptors and their XML serialization.
//!
//! A [`RegionDescriptor`] is the analysis result for one function/region
//! pair, rendered to the XML document the source-rewriting consumer
//! parses. The schema is fixed by that consumer: line spans are nested
//! `<function>`/`<region>` elements each holding `<start>` and `<end>`,
//! boolean attributes are spelled `0`/`1`, one `<regionexit>` element per
//! exit line, and a variable is an input exactly when `isoutput` is 0. A
//! variable crossing the boundary in both directions therefore appears as
//! two `<variable>` elements.
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::{region::Area, typestr::VarFlags};

/// One `<variable>` element: a variable crossing the boundary in one
/// direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    /// Rendered C type; embeds the name for function pointers.
    pub type_text: String,
    pub flags: VarFlags,
}

impl VariableDescriptor {
    pub fn is_output(&self) -> bool {
        self.flags.contains(VarFlags::OUTPUT)
    }
}

/// Everything the consumer needs to extract one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDescriptor {
    /// The enclosing function.
    pub function: String,
    /// Rendered return type of the enclosing function.
    pub return_type: String,
    /// Line area of the whole function.
    pub function_area: Area,
    /// Line area of the region.
    pub region_area: Area,
    /// Whether the region already covers the whole function body.
    pub toplevel: bool,
    /// Source lines at which control can leave the region.
    pub exit_lines: BTreeSet<u32>,
    pub variables: Vec<VariableDescriptor>,
    /// Filename-safe tag derived from the region's entry block label.
    pub entry_tag: String,
    /// Filename-safe tag derived from the region's last block label.
    pub exit_tag: String,
}

fn flag(on: bool) -> u8 {
    on as u8
}

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<extractinfo>")?;
        writeln!(f, "  <funcname>{}</funcname>", escaped(&self.function))?;
        writeln!(
            f,
            "  <funcreturntype>{}</funcreturntype>",
            escaped(&self.return_type)
        )?;
        writeln!(f, "  <function>")?;
        writeln!(f, "    <start>{}</start>", self.function_area.start)?;
        writeln!(f, "    <end>{}</end>", self.function_area.end)?;
        writeln!(f, "  </function>")?;
        writeln!(f, "  <region>")?;
        writeln!(f, "    <start>{}</start>", self.region_area.start)?;
        writeln!(f, "    <end>{}</end>", self.region_area.end)?;
        writeln!(f, "  </region>")?;
        for line in &self.exit_lines {
            writeln!(f, "  <regionexit>{line}</regionexit>")?;
        }
        writeln!(f, "  <toplevel>{}</toplevel>", flag(self.toplevel))?;
        for var in &self.variables {
            writeln!(f, "  <variable>")?;
            writeln!(f, "    <name>{}</name>", escaped(&var.name))?;
            writeln!(f, "    <type>{}</type>", escaped(&var.type_text))?;
            writeln!(f, "    <isoutput>{}</isoutput>", flag(var.is_output()))?;
            writeln!(
                f,
                "    <isconstq>{}</isconstq>",
                flag(var.flags.contains(VarFlags::CONST))
            )?;
            writeln!(
                f,
                "    <isstatic>{}</isstatic>",
                flag(var.flags.contains(VarFlags::STATIC))
            )?;
            writeln!(
                f,
                "    <isfunptr>{}</isfunptr>",
                flag(var.flags.contains(VarFlags::FUNPTR))
            )?;
            writeln!(
                f,
                "    <isarrayt>{}</isarrayt>",
                flag(var.flags.contains(VarFlags::ARRAY))
            )?;
            writeln!(f, "  </variable>")?;
        }
        write!(f, "</extractinfo>")
    }
}

impl RegionDescriptor {
    /// Render the full XML document.
    pub fn to_xml(&self) -> String {
        self.to_string()
    }

    /// The filename this descriptor is written under, tagged with the
    /// region's entry and last block labels (`scale_forcond_forend.xml`).
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.xml", self.function, self.entry_tag, self.exit_tag)
    }

    /// Write the document into `dir`, returning the path written.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        fs::write(&path, self.to_xml())?;
        info!(
            "wrote region descriptor for `{}` to {}",
            self.function,
            path.display()
        );
        Ok(path)
    }
}

/// Strip everything but alphanumerics from a block label so it is safe in
/// a filename (`for.cond` becomes `forcond`).
pub fn sanitize_tag(label: &str) -> String {
    label.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RegionDescriptor {
        RegionDescriptor {
            function: "grayscale".into(),
            return_type: "int".into(),
            function_area: Area::new(10, 42),
            region_area: Area::new(20, 30),
            toplevel: false,
            exit_lines: BTreeSet::from([30]),
            variables: vec![
                VariableDescriptor {
                    name: "width".into(),
                    type_text: "int".into(),
                    flags: VarFlags::empty(),
                },
                VariableDescriptor {
                    name: "sum".into(),
                    type_text: "unsigned long".into(),
                    flags: VarFlags::OUTPUT,
                },
            ],
            entry_tag: "forcond".into(),
            exit_tag: "forend".into(),
        }
    }

    #[test]
    fn renders_the_expected_document() {
        let xml = sample().to_xml();
        let expected = "\
<extractinfo>
  <funcname>grayscale</funcname>
  <funcreturntype>int</funcreturntype>
  <function>
    <start>10</start>
    <end>42</end>
  </function>
  <region>
    <start>20</start>
    <end>30</end>
  </region>
  <regionexit>30</regionexit>
  <toplevel>0</toplevel>
  <variable>
    <name>width</name>
    <type>int</type>
    <isoutput>0</isoutput>
    <isconstq>0</isconstq>
    <isstatic>0</isstatic>
    <isfunptr>0</isfunptr>
    <isarrayt>0</isarrayt>
  </variable>
  <variable>
    <name>sum</name>
    <type>unsigned long</type>
    <isoutput>1</isoutput>
    <isconstq>0</isconstq>
    <isstatic>0</isstatic>
    <isfunptr>0</isfunptr>
    <isarrayt>0</isarrayt>
  </variable>
</extractinfo>";
        assert_eq!(xml, expected);
    }

    #[test]
    fn line_spans_are_nested_elements() {
        // The consumer reads start/end out of the span *elements*; flat
        // tags would leave it without any location info.
        let xml = sample().to_xml();
        assert!(xml.contains("<function>\n    <start>10</start>\n    <end>42</end>\n  </function>"));
        assert!(xml.contains("<region>\n    <start>20</start>\n    <end>30</end>\n  </region>"));
        assert!(!xml.contains("<functionstart>"));
        assert!(!xml.contains("<regionstart>"));
    }

    #[test]
    fn filenames_carry_entry_and_exit_tags() {
        assert_eq!(sample().file_name(), "grayscale_forcond_forend.xml");
    }

    #[test]
    fn escapes_markup_in_names_and_types() {
        let mut desc = sample();
        desc.variables[0].type_text = "int (*cb)(char *)".into();
        desc.variables[0].name = "a<b".into();
        let xml = desc.to_xml();
        assert!(xml.contains("<name>a&lt;b</name>"));
        assert!(xml.contains("<type>int (*cb)(char *)</type>"));
    }

    #[test]
    fn tags_are_filename_safe() {
        assert_eq!(sanitize_tag("for.cond"), "forcond");
        assert_eq!(sanitize_tag("while.body.7"), "whilebody7");
        assert_eq!(sanitize_tag("entry"), "entry");
    }
}

//! Prompt templates for the two generation phases.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing what the model is asked to do
//!    (e.g. adding a shape-library rule) requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can import and inspect prompts directly
//!    without spinning up a real model, making prompt regressions easy to
//!    catch.
//!
//! Templates are process-wide constants. Composition is a pure string
//! substitution: no I/O, no randomness, no dependence on generator state.

use std::fmt;

/// An immutable instruction text with exactly one named insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    slot: &'static str,
    text: &'static str,
}

impl PromptTemplate {
    /// Template name, used in logs.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The insertion marker inside the template text, e.g. `{document_text}`.
    pub const fn slot(&self) -> &'static str {
        self.slot
    }

    /// The raw template text, placeholder included.
    pub const fn text(&self) -> &'static str {
        self.text
    }

    /// Bind the caller's text into the insertion point.
    ///
    /// Only the template's own placeholder is replaced; placeholder-like text
    /// inside `value` is left alone.
    pub fn render(&self, value: &str) -> ComposedPrompt {
        let (head, tail) = self
            .text
            .split_once(self.slot)
            .unwrap_or((self.text, ""));
        let mut out = String::with_capacity(self.text.len() + value.len());
        out.push_str(head);
        out.push_str(value);
        out.push_str(tail);
        ComposedPrompt(out)
    }
}

/// A fully-bound prompt, sent verbatim to the completion service.
///
/// Created fresh per request; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt(String);

impl ComposedPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ComposedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComposedPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Root element name of the Draw.io artifact.
pub const ARTIFACT_ROOT: &str = "mxGraphModel";

/// Analysis phase: read a document and write a one-paragraph diagram brief.
pub const ANALYSIS_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "analysis",
    slot: "{document_text}",
    text: r#"<prompt>
    <persona name="Diagram Analyst">
        <role>You are Diagram Analyst, a specialist in turning dense documents into clear visual briefs.</role>
        <directive>Understand the material deeply before describing anything. State any assumption you make when the source is ambiguous; never invent details silently.</directive>
    </persona>
    <method>
        <step number="1" name="Core Concepts">Identify the primary subjects, components, actors, and key terms.</step>
        <step number="2" name="Relationships">Determine how the concepts interact: who acts on whom, the nature of each link, and its direction.</step>
        <step number="3" name="Process and Flow">Map any sequence, methodology, lifecycle, or causal chain, in order.</step>
        <step number="4" name="Goal">Isolate the central question, purpose, or primary outcome of the material.</step>
        <step number="5" name="Ambiguities">Resolve unclear points with a stated, logical assumption.</step>
    </method>
</prompt>

---
Apply the method above to the following document.

DOCUMENT TEXT:
"""
{document_text}
"""

YOUR FINAL TASK:
Do not draw anything. Instead, write a clear natural-language prompt for a second AI that specialises in generating Draw.io diagrams from short text descriptions.

Synthesise your analysis into a single concise paragraph that names the core concepts, their relationships, and the overall flow or structure the diagram should show.

Output ONLY that paragraph. No headings, no bullet or numbered lists, no ASCII art, no legends, no code, and no commentary about what you are doing. The paragraph must be ready to hand to the other AI as-is."#,
};

/// Generation phase: turn a description into a single Draw.io XML document.
pub const ARTIFACT_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "artifact",
    slot: "{user_idea}",
    text: r#"You are an expert Draw.io diagram generator. Convert the user's description into a valid Draw.io XML document.

CRITICAL OUTPUT RULE:
Your entire response must be the raw XML and nothing else. It must start with `<mxGraphModel` (attributes allowed) and end with `</mxGraphModel>`.
Do NOT add explanations, greetings, conversation, or markdown code fences such as ```xml.

XML STRUCTURE:
- The root element is `<mxGraphModel>` and it contains a single `<root>` element.
- `<root>` must begin with two base cells: `<mxCell id="0"/>` and `<mxCell id="1" parent="0"/>`. These are the default layers; never remove them.
- Every diagram element is an `<mxCell>` with a unique `id`. Ids for your own cells are strings starting from "2" and counting up.
- The `value` attribute holds the text label of a node or edge.
- Nodes carry `vertex="1"`, `parent="1"`, and a child `<mxGeometry x=".." y=".." width=".." height=".." as="geometry"/>` giving position and size.
- Edges carry `edge="1"`, `parent="1"`, and `source`/`target` attributes naming the ids of the nodes they connect, plus `<mxGeometry relative="1" as="geometry"/>`.
- Lay the nodes out logically (top-to-bottom for flowcharts, left-to-right for pipelines) with no overlapping shapes.

SHAPE AND ICON SELECTION (apply the first rule that fits):

1. CISCO DEVICES — when the description names Cisco hardware ("Cisco router", "Catalyst switch", "ASA firewall"), use the vector shapes of the `mxgraph.cisco` library:
   - Router: `shape=mxgraph.cisco.routers.router`
   - L3 switch: `shape=mxgraph.cisco.switches.layer_3_switch`
   - Generic switch: `shape=mxgraph.cisco.switches.workgroup_switch`
   - ASA firewall: `shape=mxgraph.cisco.firewalls.asa_5500`
   Style them consistently: `sketch=0;html=1;pointerEvents=1;dashed=0;fillColor=#036897;strokeColor=#ffffff;strokeWidth=2;verticalLabelPosition=bottom;verticalAlign=top;align=center;outlineConnect=0;`
   Example: `<mxCell id="2" value="Core Router" style="shape=mxgraph.cisco.routers.router;sketch=0;html=1;pointerEvents=1;dashed=0;fillColor=#036897;strokeColor=#ffffff;strokeWidth=2;verticalLabelPosition=bottom;verticalAlign=top;align=center;outlineConnect=0;" vertex="1" parent="1"><mxGeometry x="100" y="100" width="78" height="53" as="geometry"/></mxCell>`

2. VENDOR TECHNOLOGY — for cloud platforms, virtualisation, DevOps tooling, and non-Cisco network vendors, use the `dtc-*` libraries, e.g.:
   - AWS S3 bucket: `shape=dtc-aws.S3`; AWS EC2: `shape=dtc-aws.EC2`
   - Azure VM: `shape=dtc-azure.Virtual-Machine`
   - GCP Cloud SQL: `shape=dtc-gcp.Cloud-SQL`
   - Docker container: `shape=dtc-devops.docker_container`
   - Palo Alto firewall: `shape=dtc-network-paloalto.PAN-100`
   - FortiGate firewall: `shape=dtc-network-fortinet.fortigate_100_series`
   - Generic (non-Cisco) router: `shape=dtc-network.router`

3. GENERAL CONCEPTS — use Draw.io built-ins:
   - User or person: `shape=actor`
   - Database: `shape=cylinder3` or `shape=datastore`
   - Document or file: `shape=document`
   - Cloud: `shape=cloud`
   - Server: `shape=server`
   - PC or workstation: `shape=mxgraph.networks.pc` with `fontColor=#0066CC;verticalAlign=top;verticalLabelPosition=bottom;labelPosition=center;align=center;html=1;outlineConnect=0;fillColor=#CCCCCC;strokeColor=#6881B3;strokeWidth=2;`

4. FLOWCHARTS — keep the vocabulary consistent:
   - Start/End: `shape=ellipse;rounded=1;`
   - Process/Action: `shape=rectangle;rounded=1;`
   - Decision: `shape=rhombus;`

5. GROUPING — wrap related items (a VPC, a subnet, a team) in a container cell styled `swimlane=0;dashed=1;strokeColor=#cccccc;`.

6. FALLBACK — when nothing above fits, use a rounded rectangle (`rounded=1;whiteSpace=wrap;html=1;`) with a clear label.

Now create a complete and valid Draw.io XML document for this request: "{user_idea}""#,
};

/// Build the analysis-phase prompt around extracted document text.
pub fn build_analysis_prompt(document_text: &str) -> ComposedPrompt {
    ANALYSIS_TEMPLATE.render(document_text)
}

/// Build the generation-phase prompt around the user's description.
pub fn build_artifact_prompt(user_idea: &str) -> ComposedPrompt {
    ARTIFACT_TEMPLATE.render(user_idea)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_template_has_exactly_one_slot() {
        for t in [ANALYSIS_TEMPLATE, ARTIFACT_TEMPLATE] {
            assert_eq!(
                t.text().matches(t.slot()).count(),
                1,
                "template '{}' must contain its slot once",
                t.name()
            );
        }
    }

    #[test]
    fn artifact_prompt_embeds_idea_verbatim() {
        let idea = "A login flow with start, check, success, fail, end";
        let p = build_artifact_prompt(idea);
        assert!(p.as_str().contains(&format!("\"{idea}\"")));
        assert!(!p.as_str().contains("{user_idea}"));
    }

    #[test]
    fn analysis_prompt_embeds_document_inside_quotes() {
        let p = build_analysis_prompt("Orders flow from cart to checkout.");
        assert!(p
            .as_str()
            .contains("\"\"\"\nOrders flow from cart to checkout.\n\"\"\""));
    }

    #[test]
    fn composition_is_deterministic() {
        let a = build_artifact_prompt("three tier web app");
        let b = build_artifact_prompt("three tier web app");
        assert_eq!(a, b);
        assert_eq!(
            build_analysis_prompt("same text"),
            build_analysis_prompt("same text")
        );
    }

    #[test]
    fn placeholder_in_caller_text_is_not_expanded() {
        let p = build_artifact_prompt("literal {user_idea} here");
        assert_eq!(p.as_str().matches("{user_idea}").count(), 1);
    }

    #[test]
    fn artifact_prompt_mandates_markers_and_base_cells() {
        let t = ARTIFACT_TEMPLATE.text();
        assert!(t.contains("<mxGraphModel"));
        assert!(t.contains("</mxGraphModel>"));
        assert!(t.contains(r#"id="0""#));
        assert!(t.contains(r#"id="1""#));
        assert!(t.contains("source"));
        assert!(t.contains("target"));
    }

    #[test]
    fn artifact_prompt_orders_shape_policy_specific_first() {
        let t = ARTIFACT_TEMPLATE.text();
        let cisco = t.find("CISCO DEVICES").unwrap();
        let vendor = t.find("VENDOR TECHNOLOGY").unwrap();
        let fallback = t.find("FALLBACK").unwrap();
        assert!(cisco < vendor && vendor < fallback);
    }

    #[test]
    fn analysis_prompt_forbids_other_shapes() {
        let t = ANALYSIS_TEMPLATE.text();
        assert!(t.contains("single concise paragraph"));
        assert!(t.contains("Output ONLY that paragraph"));
    }
}

//! Whole-project previews driven through the public session API

use glimpse_common::{PreviewConfig, VirtualFileStore};
use glimpse_evaluator::{BootError, DiagnosticKind, HostMessage, PreviewSession, VirtualDomDocument};

fn boot(files: &[(&str, &str)], config: PreviewConfig) -> PreviewSession {
    let mut session = PreviewSession::new(VirtualFileStore::new(files.iter().copied()), config);
    let _ = session.boot_now();
    session
}

const LANDING: &[(&str, &str)] = &[
    (
        "src/main.tsx",
        r#"
import { StrictMode } from "react";
import { createRoot } from "react-dom/client";
import App from "./App";
import "./index.css";

createRoot(document.getElementById("root")!).render(
  <StrictMode>
    <App />
  </StrictMode>
);
"#,
    ),
    ("src/index.css", ".hero { color: rebeccapurple; }"),
    (
        "src/components/Hero.tsx",
        r#"
import { Button } from "@/components/ui/button";
import { ArrowRight } from "lucide-react";

interface HeroProps {
  title: string;
}

export const Hero = ({ title }: HeroProps) => (
  <section className="hero">
    <h1>{title}</h1>
    <Button size="lg">Get started <ArrowRight /></Button>
  </section>
);
"#,
    ),
    (
        "src/App.tsx",
        r#"
import { useState } from "react";
import { Hero } from "./components/Hero";

type Plan = { name: string; price: number };
const plans: Plan[] = [
  { name: "Hobby", price: 0 },
  { name: "Team", price: 29 },
];

export default function App() {
  const [yearly, setYearly] = useState<boolean>(false);
  return (
    <main>
      <Hero title="Ship previews faster" />
      <button onClick={() => setYearly(!yearly)}>Toggle billing</button>
      <ul>
        {plans.map((plan) => (
          <li key={plan.name}>
            {plan.name}: ${yearly ? plan.price * 10 : plan.price}
          </li>
        ))}
      </ul>
    </main>
  );
}
"#,
    ),
];

#[test]
fn test_landing_page_preview() {
    let mut session = boot(LANDING, PreviewConfig::default());
    assert!(session.is_mounted(), "{:?}", session.failure());
    assert!(session.diagnostics().is_empty(), "{:?}", session.diagnostics());
    assert!(session.stylesheet().contains("rebeccapurple"));

    let text = session.document().text_content();
    assert!(text.contains("Ship previews faster"));
    assert!(text.contains("Team: $29"));

    let toggle = session.find_by_text("Toggle billing").unwrap();
    assert!(session.click(toggle));
    assert!(session.document().text_content().contains("Team: $290"));

    let messages = session.take_messages();
    assert!(matches!(
        messages.as_slice(),
        [HostMessage::InspectElement { tag_name, .. }] if tag_name == "BUTTON"
    ));
}

#[test]
fn test_documents_are_deterministic() {
    let documents: Vec<VirtualDomDocument> = (0..5)
        .map(|_| boot(LANDING, PreviewConfig::default()).document())
        .collect();
    for (index, document) in documents.iter().enumerate().skip(1) {
        assert_eq!(&documents[0], document, "preview {} differs from preview 0", index);
    }
}

#[test]
fn test_custom_alias_and_source_root() {
    let config = PreviewConfig::from_json(r#"{ "aliasPrefix": "~/", "sourceRoot": "app/", "mountId": "app" }"#)
        .unwrap();
    let session = boot(
        &[
            ("app/lib/greeting.ts", "export const greeting = 'Hi from app/';"),
            (
                "app/App.tsx",
                "import { greeting } from '~/lib/greeting';\nexport default () => <p>{greeting}</p>;",
            ),
        ],
        config,
    );
    let document = session.document();
    assert_eq!(document.nodes[0].attr("id"), Some("app"));
    assert!(document.text_content().contains("Hi from app/"));
}

#[test]
fn test_empty_project_reports_missing_entry() {
    let session = boot(&[], PreviewConfig::default());
    assert!(matches!(session.failure(), Some(BootError::NoEntry { .. })));
    assert!(session
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::Bootstrap));
}

#[test]
fn test_messages_serialize_for_the_host() {
    let mut session = boot(LANDING, PreviewConfig::default());
    let toggle = session.find_by_text("Toggle billing").unwrap();
    session.click(toggle);
    let json = serde_json::to_value(session.take_messages()).unwrap();
    assert_eq!(json[0]["type"], "inspect-element");
    assert_eq!(json[0]["tagName"], "BUTTON");
    assert_eq!(json[0]["path"], "src/App.tsx");
}

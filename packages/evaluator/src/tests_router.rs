/// Client-side routing against the session location
use crate::channel::HostMessage;
use crate::tests_session::{preview, text_of};
use crate::PreviewSession;

fn navigations(session: &mut PreviewSession) -> Vec<String> {
    session
        .take_messages()
        .into_iter()
        .filter_map(|message| match message {
            HostMessage::Navigation { path } => Some(path),
            _ => None,
        })
        .collect()
}

fn click_text(session: &mut PreviewSession, text: &str) {
    let node = session
        .find_by_text(text)
        .unwrap_or_else(|| panic!("nothing reads {:?}", text));
    assert!(session.click(node));
}

const SHOP: &str = r#"
import { BrowserRouter, Routes, Route, Link, NavLink, useParams } from "react-router-dom";

function Home() {
  return <p>Home page</p>;
}

function Product() {
  const { id } = useParams();
  return <p>Product {id}</p>;
}

export default function App() {
  return (
    <BrowserRouter>
      <nav>
        <NavLink to="/" end className="tab">Start</NavLink>
        <Link to="/products/7">Open seven</Link>
      </nav>
      <Routes>
        <Route path="/" element={<Home />} />
        <Route path="/products/:id" element={<Product />} />
        <Route path="*" element={<p>Not found</p>} />
      </Routes>
    </BrowserRouter>
  );
}
"#;

#[test]
fn test_link_navigates_and_posts_route() {
    let mut session = preview(&[("src/App.tsx", SHOP)]);
    assert!(text_of(&session).contains("Home page"));
    session.take_messages();

    click_text(&mut session, "Open seven");
    assert!(text_of(&session).contains("Product 7"));
    assert!(!text_of(&session).contains("Home page"));
    assert_eq!(navigations(&mut session), vec!["/products/7".to_string()]);
    assert_eq!(session.location().pathname, "/products/7");
}

#[test]
fn test_nav_link_marks_active_route() {
    let mut session = preview(&[("src/App.tsx", SHOP)]);
    let document = session.document();
    let start = document.find(&|node| node.text_content() == "Start" && node.tag() == Some("a"));
    let start = start.unwrap();
    assert_eq!(start.attr("class"), Some("tab active"));
    assert_eq!(start.attr("aria-current"), Some("page"));
    assert_eq!(start.attr("href"), Some("/"));

    click_text(&mut session, "Open seven");
    let document = session.document();
    let start = document
        .find(&|node| node.text_content() == "Start" && node.tag() == Some("a"))
        .unwrap();
    assert_eq!(start.attr("class"), Some("tab"));
    assert_eq!(start.attr("aria-current"), None);
}

#[test]
fn test_unmatched_route_falls_to_splat() {
    let mut session = preview(&[("src/App.tsx", SHOP)]);
    session.receive(crate::InboundMessage::NavigateTo {
        path: "/nowhere/at/all".to_string(),
    });
    assert!(text_of(&session).contains("Not found"));
}

#[test]
fn test_nested_routes_with_outlet_and_index() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { BrowserRouter, Routes, Route, Outlet, Link } from "react-router-dom";

function Layout() {
  return (
    <div>
      <h1>Dashboard</h1>
      <Link to="settings">Settings link</Link>
      <Outlet />
    </div>
  );
}

export default function App() {
  return (
    <BrowserRouter>
      <Routes>
        <Route path="/" element={<Layout />}>
          <Route index element={<p>Overview</p>} />
          <Route path="settings" element={<p>Settings panel</p>} />
        </Route>
      </Routes>
    </BrowserRouter>
  );
}
"#,
    )]);

    let text = text_of(&session);
    assert!(text.contains("Dashboard"));
    assert!(text.contains("Overview"));

    click_text(&mut session, "Settings link");
    let text = text_of(&session);
    assert!(text.contains("Dashboard"));
    assert!(text.contains("Settings panel"));
    assert!(!text.contains("Overview"));
}

#[test]
fn test_use_navigate_and_back() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { BrowserRouter, Routes, Route, useNavigate, useLocation } from "react-router-dom";

function Step() {
  const navigate = useNavigate();
  const location = useLocation();
  return (
    <div>
      <p>At {location.pathname}</p>
      <button onClick={() => navigate("/checkout")}>Continue</button>
      <button onClick={() => navigate(-1)}>Back</button>
    </div>
  );
}

export default function App() {
  return (
    <BrowserRouter>
      <Routes>
        <Route path="*" element={<Step />} />
      </Routes>
    </BrowserRouter>
  );
}
"#,
    )]);

    assert!(text_of(&session).contains("At /"));
    click_text(&mut session, "Continue");
    assert!(text_of(&session).contains("At /checkout"));
    assert_eq!(session.location().history_len(), 1);

    click_text(&mut session, "Back");
    assert!(text_of(&session).contains("At /"));
    assert!(!text_of(&session).contains("checkout"));
    let routes = navigations(&mut session);
    assert_eq!(routes, vec!["/checkout".to_string(), "/".to_string()]);
}

#[test]
fn test_search_params() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { useSearchParams } from "react-router-dom";

export default function Filters() {
  const [params, setParams] = useSearchParams();
  const sort = params.get("sort") || "none";
  return (
    <div>
      <p>Sorted by {sort}</p>
      <button onClick={() => setParams({ sort: "price" })}>By price</button>
    </div>
  );
}
"#,
    )]);

    assert!(text_of(&session).contains("Sorted by none"));
    click_text(&mut session, "By price");
    assert!(text_of(&session).contains("Sorted by price"));
    assert_eq!(session.location().search, "?sort=price");
}

#[test]
fn test_hash_router_writes_fragment() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { HashRouter, Routes, Route, Link } from "react-router-dom";

export default function App() {
  return (
    <HashRouter>
      <Link to="/about">About us</Link>
      <Routes>
        <Route path="/" element={<p>Landing</p>} />
        <Route path="/about" element={<p>About page</p>} />
      </Routes>
    </HashRouter>
  );
}
"#,
    )]);

    let document = session.document();
    let link = document.find(&|node| node.tag() == Some("a")).unwrap();
    assert_eq!(link.attr("href"), Some("#/about"));
    assert!(text_of(&session).contains("Landing"));

    click_text(&mut session, "About us");
    assert!(text_of(&session).contains("About page"));
    assert_eq!(session.location().hash, "#/about");
    assert_eq!(session.location().pathname, "/");
}

#[test]
fn test_navigate_element_redirects() {
    let mut session = preview(&[(
        "src/App.tsx",
        r#"
import { BrowserRouter, Routes, Route, Navigate } from "react-router-dom";

export default function App() {
  return (
    <BrowserRouter>
      <Routes>
        <Route path="/" element={<Navigate to="/welcome" replace />} />
        <Route path="/welcome" element={<p>Welcome aboard</p>} />
      </Routes>
    </BrowserRouter>
  );
}
"#,
    )]);

    assert!(text_of(&session).contains("Welcome aboard"));
    assert_eq!(session.location().pathname, "/welcome");
    assert_eq!(session.location().history_len(), 0);
    assert_eq!(navigations(&mut session), vec!["/welcome".to_string()]);
}

#[test]
fn test_inbound_route_drives_router() {
    let mut session = preview(&[("src/App.tsx", SHOP)]);
    session.take_messages();
    session.receive(crate::InboundMessage::NavigateTo {
        path: "/products/3".to_string(),
    });
    assert!(text_of(&session).contains("Product 3"));
    assert!(navigations(&mut session).is_empty());
}

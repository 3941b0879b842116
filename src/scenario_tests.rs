//! End-to-end compiles over in-memory sources.

use crate::compiler::{CompileOutput, Compiler};
use crate::diagnostic::BF_MISSING_CLIENT_DIRECTIVE;
use crate::discovery::MemoryReader;
use crate::options::CompileOptions;
use crate::parse::js_syntax_errors;

fn compile(reader: &MemoryReader, entry: &str) -> CompileOutput {
    Compiler::new(CompileOptions::default())
        .compile_jsx(entry, reader)
        .expect("compile")
}

fn assert_client_js_parses(out: &CompileOutput) {
    for file in &out.files {
        let errors = js_syntax_errors(&file.client_js);
        assert!(errors.is_empty(), "{}: {:?}\n{}", file.file_path, errors, file.client_js);
    }
}

const CHILD_WITH_STATE: &str = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Child({ onAdd }) {
  const [busy, setBusy] = createSignal(false)
  return <button disabled={busy()} onClick={() => { setBusy(true); onAdd() }}>Add</button>
}
"#;

#[test]
fn test_counter_binds_button_without_query() {
    let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Counter() {
  const [count,setCount]=createSignal(0); return <button onClick={()=>setCount(n=>n+1)}>{count()}</button>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Counter.tsx", src);
    let out = compile(&reader, "/app/Counter.tsx");
    let js = &out.files[0].client_js;
    assert!(js.contains("const [count, setCount] = createSignal(0)"));
    assert!(js.contains(".textContent = __bfStr(count())"));
    assert!(js.contains("__s0.onclick = "));
    assert!(js.contains("const __s0 = __scope"));
    assert!(!js.contains("__bfFind("));
    assert!(!js.contains("querySelector"));
    assert!(!js.contains("addEventListener"));
}

#[test]
fn test_signal_without_directive_is_fatal() {
    let src = r#"import { createSignal } from '@barefootjs/dom'

export function Counter({ initial }) {
  const [count, setCount] = createSignal(initial)
  return <button onClick={() => setCount(count() + 1)}>{count()}</button>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Counter.tsx", src);
    let out = compile(&reader, "/app/Counter.tsx");
    let file = &out.files[0];
    assert!(file
        .errors
        .iter()
        .any(|e| e.code == BF_MISSING_CLIENT_DIRECTIVE && e.severity == "error"));
    assert_eq!(file.client_js, "");
    assert_eq!(file.client_js_filename, "");
    assert!(out.has_errors());
}

#[test]
fn test_callback_prop_is_passed_unwrapped() {
    let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Child } from './Child'

export default function List() {
  const [items, setItems] = createSignal([])
  const handleAdd = () => setItems([...items(), items().length])
  return <div><p>{items().length}</p><Child onAdd={handleAdd} /></div>
}
"#;
    let reader = MemoryReader::new()
        .with_file("/app/List.tsx", parent)
        .with_file("/app/Child.tsx", CHILD_WITH_STATE);
    let out = compile(&reader, "/app/List.tsx");
    let js = &out.file("/app/List.tsx").unwrap().client_js;
    assert!(js.contains("initChild({ onAdd: handleAdd }, 0, __p0)"));
    assert!(!js.contains("updateAll"));
}

#[test]
fn test_reactive_children_become_thunk() {
    let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Button } from './Button'

export function Toolbar() {
  const [count, setCount] = createSignal(0)
  return <nav><Button>{count()}</Button><i onClick={() => setCount(count() + 1)}>+</i></nav>
}
"#;
    let button = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Button({ children }) {
  const [pressed, setPressed] = createSignal(false)
  return <button onClick={() => setPressed(!pressed())}>{children}</button>
}
"#;
    let reader = MemoryReader::new()
        .with_file("/app/Toolbar.tsx", parent)
        .with_file("/app/Button.tsx", button);
    let out = compile(&reader, "/app/Toolbar.tsx");
    let js = &out.file("/app/Toolbar.tsx").unwrap().client_js;
    assert!(js.contains("initButton({ children: () => `"));
    assert!(js.contains("count()"));
}

#[test]
fn test_nested_keyed_loops_reconcile_independently() {
    let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Board() {
  const [columns, setColumns] = createSignal([])
  const remove = (id) => setColumns(columns().filter((c) => c.id !== id))
  return <div>{columns().map((col) => <section key={col.id}><h2>{col.title}</h2><ul>{col.cards.map((card) => <li key={card.id}><button onClick={() => remove(card.id)}>{card.title}</button></li>)}</ul></section>)}</div>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Board.tsx", src);
    let out = compile(&reader, "/app/Board.tsx");
    let file = &out.files[0];

    assert!(file.marked_template.contains("data-key=\"{{ col.id }}\""));
    assert!(file.marked_template.contains("data-key=\"{{ card.id }}\""));

    let js = &file.client_js;
    assert!(js.contains("__bfAttrStr('data-key', col.id)"));
    assert!(js.contains("__bfAttrStr('data-key', card.id)"));
    assert!(js.contains(
        "createEffect(() => __bfReconcile(__scope, __scope, 'l0', columns(), (col, __i0) => col.id, __render_l0, __bind_l0))"
    ));
    assert!(js.contains(
        "__bfReconcile(__scope, __el, 'l1', col.cards, (card, __i1) => card.id, __render_l1, __bind_l1)"
    ));
    assert!(js.contains("__s0.onclick = () => remove(card.id)"));
}

#[test]
fn test_module_constant_follows_child_prop() {
    let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Snippet } from './Snippet'

const code = `const greeting = 'hi'`
const other = 'never referenced'

export function Docs() {
  const [tab, setTab] = createSignal('a')
  return <div><p onClick={() => setTab('b')}>{tab()}</p><Snippet source={code} /></div>
}
"#;
    let snippet = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Snippet({ source }) {
  const [copied, setCopied] = createSignal(false)
  return <pre onClick={() => setCopied(true)}>{copied() ? 'copied' : source}</pre>
}
"#;
    let reader = MemoryReader::new()
        .with_file("/app/Docs.tsx", parent)
        .with_file("/app/Snippet.tsx", snippet);
    let out = compile(&reader, "/app/Docs.tsx");
    let js = &out.file("/app/Docs.tsx").unwrap().client_js;
    assert!(js.contains("const code = `const greeting = 'hi'`"));
    assert!(js.contains("source: code"));
    assert!(!js.contains("never referenced"));
}

#[test]
fn test_compiles_are_idempotent() {
    let reader = MemoryReader::new()
        .with_file(
            "/app/List.tsx",
            "\"use client\"\nimport { createSignal } from '@barefootjs/dom'\nimport { Child } from './Child'\nexport function List() {\n  const [n, setN] = createSignal(0)\n  return <div>{n()}<Child onAdd={() => setN(n() + 1)} /></div>\n}\n",
        )
        .with_file("/app/Child.tsx", CHILD_WITH_STATE);
    let first = compile(&reader, "/app/List.tsx");
    let second = compile(&reader, "/app/List.tsx");
    assert_eq!(first.files.len(), 2);
    for (a, b) in first.files.iter().zip(&second.files) {
        assert_eq!(a.client_js, b.client_js);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.client_js_filename, b.client_js_filename);
        assert_eq!(a.hash.len(), 8);
    }
}

#[test]
fn test_destructured_props_snapshot_and_object_props_stay_live() {
    let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Snapshot } from './Snapshot'
import { Live } from './Live'

export default function Parent() {
  const [count, setCount] = createSignal(0)
  return <div><button onClick={() => setCount(count() + 1)}>+</button><Snapshot value={count()} /><Live value={count()} /></div>
}
"#;
    let snapshot = "\"use client\"\nexport function Snapshot({ value }) {\n  return <p>{value}</p>\n}\n";
    let live = "\"use client\"\nexport function Live(props) {\n  return <p>{props.value}</p>\n}\n";
    let reader = MemoryReader::new()
        .with_file("/app/Parent.tsx", parent)
        .with_file("/app/Snapshot.tsx", snapshot)
        .with_file("/app/Live.tsx", live);
    let out = compile(&reader, "/app/Parent.tsx");

    // the destructured value is read once; nothing re-reads it
    let snapshot = out.component("Snapshot").unwrap();
    assert_eq!(snapshot.client_js, "");

    let live = out.component("Live").unwrap();
    assert!(live.client_js.contains("const props = __props"));
    assert!(live
        .client_js
        .contains("createEffect(() => { __t0.textContent = __bfStr(props.value) })"));

    let parent = &out.file("/app/Parent.tsx").unwrap().client_js;
    assert!(parent.contains("initLive({ get value() { return count() } }, 0, __p1)"));
    assert!(!parent.contains("initSnapshot"));
}

#[test]
fn test_forwarded_event_on_static_child_is_wired_by_parent() {
    let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Btn } from './Btn'

export function P() {
  const [n, setN] = createSignal(0)
  return <div><p>{n()}</p><Btn label="inc" onClick={() => setN(n() + 1)} /></div>
}
"#;
    let btn = "export function Btn({ onClick, label }) {\n  return <button onClick={onClick}>{label}</button>\n}\n";
    let reader = MemoryReader::new()
        .with_file("/app/P.tsx", parent)
        .with_file("/app/Btn.tsx", btn);
    let out = compile(&reader, "/app/P.tsx");
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert_client_js_parses(&out);

    assert_eq!(out.component("Btn").unwrap().client_js, "");
    let js = &out.file("/app/P.tsx").unwrap().client_js;
    assert!(js.contains("const __p0 = __bfPath(__scope, [1])"));
    assert!(js.contains("__p0.onclick = () => setN(n() + 1)"));
    assert!(!js.contains("initBtn"));
    assert!(!js.contains("./Btn"));
}

#[test]
fn test_jsx_local_is_inlined_not_emitted() {
    let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Item() {
  const [n, setN] = createSignal(0)
  const icon = <b>i</b>
  return <div>{icon}<button onClick={() => setN(n() + 1)}>{n()}</button></div>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Item.tsx", src);
    let out = compile(&reader, "/app/Item.tsx");
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert_client_js_parses(&out);

    let file = &out.files[0];
    assert!(file.marked_template.contains("<b>i</b>"));
    assert!(!file.client_js.contains("const icon"));
    assert!(file.client_js.contains("__bfPath(__scope, [1])"));
    assert!(file.client_js.contains("__s0.onclick = () => setN(n() + 1)"));
}

#[test]
fn test_keyed_list_reorders_existing_nodes() {
    let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Todos() {
  const [todos, setTodos] = createSignal([{ id: 1, text: 'a' }, { id: 2, text: 'b' }])
  return <div><button onClick={() => setTodos([...todos()].reverse())}>flip</button><ul>{todos().map((t) => <li key={t.id}>{t.text}</li>)}</ul></div>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Todos.tsx", src);
    let out = compile(&reader, "/app/Todos.tsx");
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert_client_js_parses(&out);

    let js = &out.files[0].client_js;
    // the key extractor reaches the reconciler, and items render with their key
    assert!(js.contains("todos(), (t, __i0) => t.id, __render_l0"));
    assert!(js.contains("function __render_l0(t, __i0) {"));
    assert!(js.contains("__bfAttrStr('data-key', t.id)"));
    // existing nodes are looked up by key and moved, not re-rendered
    let helper = &js[js.find("function __bfReconcile(").unwrap()..];
    assert!(helper.contains("byKey.set(key ? n.getAttribute('data-key') : String(i), n)"));
    assert!(helper.contains("let node = byKey.get(k)"));
    assert!(helper.contains("for (const n of next) end.before(n)"));
}

#[test]
fn test_child_in_reactive_branch_is_rebound_on_swap() {
    let host = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Panel } from './Panel'

export function Host() {
  const [show, setShow] = createSignal(false)
  return <div><button onClick={() => setShow(!show())}>toggle</button>{show() && <Panel title="x" />}</div>
}
"#;
    let panel = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Panel({ title }) {
  const [open, setOpen] = createSignal(true)
  return <section onClick={() => setOpen(!open())}>{title}</section>
}
"#;
    let reader = MemoryReader::new()
        .with_file("/app/Host.tsx", host)
        .with_file("/app/Panel.tsx", panel);
    let out = compile(&reader, "/app/Host.tsx");
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert_client_js_parses(&out);

    let js = &out.file("/app/Host.tsx").unwrap().client_js;
    let swap = js.find("__bfSwap(__scope").unwrap();
    let branch = js[swap..].find("if (__v) {").unwrap() + swap;
    assert!(js[swap..branch].contains("renderPanel("));
    assert!(js[branch..].contains("initPanel("));
    let panel_file = &out.component("Panel").unwrap().client_js_filename;
    assert!(js.contains(&format!("from './{}'", panel_file)));
}

#[test]
fn test_props_read_inside_list_item() {
    let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Tags(props) {
  const [sel, setSel] = createSignal('')
  return <ul>{props.tags.map((tag) => <li key={tag} onClick={() => setSel(tag)}>{props.prefix}{tag}</li>)}</ul>
}
"#;
    let reader = MemoryReader::new().with_file("/app/Tags.tsx", src);
    let out = compile(&reader, "/app/Tags.tsx");
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    assert_client_js_parses(&out);

    let js = &out.files[0].client_js;
    assert!(js.contains("const props = __props"));
    assert!(js.contains("__bfEsc(props.prefix)"));
    assert!(js.contains("props.tags, (tag, __i0) => tag"));
    assert!(js.contains("onclick = () => setSel(tag)"));
}


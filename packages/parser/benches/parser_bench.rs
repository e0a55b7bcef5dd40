use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glimpse_parser::parse;

fn parse_simple_component(c: &mut Criterion) {
    let source = r#"
        export default function Button({ label }: { label: string }) {
            return <button className="px-4 py-2">{label}</button>;
        }
    "#;

    c.bench_function("parse_simple_component", |b| {
        b.iter(|| parse(black_box(source)))
    });
}

fn parse_medium_component(c: &mut Criterion) {
    let source = r#"
        import { useState } from "react";
        import { Card, CardHeader, CardTitle } from "@/components/ui/card";

        interface Item { id: number; title: string; done?: boolean }

        export function TodoList({ initial }: { initial: Item[] }) {
            const [items, setItems] = useState<Item[]>(initial);
            const toggle = (id: number) =>
                setItems((prev) => prev.map((i) => (i.id === id ? { ...i, done: !i.done } : i)));

            return (
                <Card>
                    <CardHeader>
                        <CardTitle>Todo ({items.length})</CardTitle>
                    </CardHeader>
                    <ul className="space-y-2">
                        {items.map((item) => (
                            <li key={item.id} onClick={() => toggle(item.id)}>
                                {item.done ? <s>{item.title}</s> : item.title}
                            </li>
                        ))}
                    </ul>
                </Card>
            );
        }
    "#;

    c.bench_function("parse_medium_component", |b| {
        b.iter(|| parse(black_box(source)))
    });
}

criterion_group!(benches, parse_simple_component, parse_medium_component);
criterion_main!(benches);

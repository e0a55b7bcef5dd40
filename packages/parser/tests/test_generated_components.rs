use glimpse_parser::ast::*;
use glimpse_parser::parse;

const DASHBOARD: &str = r#"
import { useState, useMemo } from "react";
import { Link, useNavigate } from "react-router-dom";
import { Button } from "@/components/ui/button";
import { Card, CardContent, CardHeader, CardTitle } from "@/components/ui/card";
import { ArrowRight, TrendingUp } from "lucide-react";
import { cn } from "@/lib/utils";
import heroImage from "@/assets/hero.png";

interface Stat {
  label: string;
  value: number;
  trend?: "up" | "down";
}

const stats: Stat[] = [
  { label: "Revenue", value: 12400, trend: "up" },
  { label: "Orders", value: 320 },
];

export default function Dashboard({ title = "Overview" }: { title?: string }) {
  const [filter, setFilter] = useState<string>("");
  const navigate = useNavigate();
  const visible = useMemo(
    () => stats.filter((s) => s.label.toLowerCase().includes(filter.toLowerCase())),
    [filter]
  );

  const handleClick = (e: React.MouseEvent<HTMLButtonElement>) => {
    e.stopPropagation();
    navigate("/reports");
  };

  return (
    <div className={cn("min-h-screen p-8", filter && "bg-muted")}>
      <img src={heroImage} alt="Hero" className="w-full rounded-lg" />
      <h1 className="text-3xl font-bold">{title}</h1>
      <input
        value={filter}
        onChange={(e) => setFilter(e.target.value)}
        placeholder="Filter stats..."
      />
      <div className="grid grid-cols-2 gap-4">
        {visible.map((stat) => (
          <Card key={stat.label}>
            <CardHeader>
              <CardTitle>{stat.label}</CardTitle>
            </CardHeader>
            <CardContent>
              {stat.value.toLocaleString()}
              {stat.trend === "up" && <TrendingUp className="h-4 w-4" />}
            </CardContent>
          </Card>
        ))}
      </div>
      <Button onClick={handleClick}>
        View reports <ArrowRight />
      </Button>
      <Link to="/settings">Settings</Link>
    </div>
  );
}
"#;

#[test]
fn test_parse_generated_dashboard() {
    let result = parse(DASHBOARD);
    assert!(result.is_ok(), "Parse error: {:?}", result.err());

    let program = result.unwrap();
    let imports = program
        .body
        .iter()
        .filter(|s| matches!(s, Statement::Import(_)))
        .count();
    assert_eq!(imports, 7);
    assert!(program
        .body
        .iter()
        .any(|s| matches!(s, Statement::ExportDefault { .. })));
}

#[test]
fn test_parse_entry_module() {
    let source = r#"
import { StrictMode } from 'react'
import { createRoot } from 'react-dom/client'
import './index.css'
import App from './App.tsx'

createRoot(document.getElementById('root')!).render(
  <StrictMode>
    <App />
  </StrictMode>,
)
"#;
    let program = parse(source).unwrap();
    assert_eq!(program.body.len(), 5);
}

#[test]
fn test_parse_context_provider_module() {
    let source = r#"
import { createContext, useContext, useState, ReactNode } from "react";

type Theme = "light" | "dark";

interface ThemeContextValue {
  theme: Theme;
  toggle: () => void;
}

const ThemeContext = createContext<ThemeContextValue | undefined>(undefined);

export function ThemeProvider({ children }: { children: ReactNode }) {
  const [theme, setTheme] = useState<Theme>("light");
  const toggle = () => setTheme((t) => (t === "light" ? "dark" : "light"));
  return (
    <ThemeContext.Provider value={{ theme, toggle }}>
      {children}
    </ThemeContext.Provider>
  );
}

export const useTheme = () => {
  const ctx = useContext(ThemeContext);
  if (!ctx) throw new Error("useTheme must be used within ThemeProvider");
  return ctx;
};
"#;
    let program = parse(source).unwrap();
    assert_eq!(program.declared_exports(), vec!["ThemeProvider", "useTheme"]);
}

#[test]
fn test_parse_shadcn_button() {
    let source = r#"
import * as React from "react"
import { Slot } from "@radix-ui/react-slot"
import { cva, type VariantProps } from "class-variance-authority"

import { cn } from "@/lib/utils"

const buttonVariants = cva(
  "inline-flex items-center justify-center rounded-md text-sm font-medium",
  {
    variants: {
      variant: {
        default: "bg-primary text-primary-foreground hover:bg-primary/90",
        outline: "border border-input bg-background",
      },
      size: {
        default: "h-10 px-4 py-2",
        sm: "h-9 rounded-md px-3",
      },
    },
    defaultVariants: {
      variant: "default",
      size: "default",
    },
  }
)

export interface ButtonProps
  extends React.ButtonHTMLAttributes<HTMLButtonElement>,
    VariantProps<typeof buttonVariants> {
  asChild?: boolean
}

const Button = React.forwardRef<HTMLButtonElement, ButtonProps>(
  ({ className, variant, size, asChild = false, ...props }, ref) => {
    const Comp = asChild ? Slot : "button"
    return (
      <Comp
        className={cn(buttonVariants({ variant, size, className }))}
        ref={ref}
        {...props}
      />
    )
  }
)
Button.displayName = "Button"

export { Button, buttonVariants }
"#;
    let result = parse(source);
    assert!(result.is_ok(), "Parse error: {:?}", result.err());
    assert_eq!(
        result.unwrap().declared_exports(),
        vec!["Button", "buttonVariants"]
    );
}

//! Default scaffold files for scaffold-eligible generations.
//!
//! A fixed, finite table. Entries are only inserted for paths the
//! collaborator did not produce itself, so a generated manifest or entry
//! point always wins over the default.

use crate::tree::FileMap;

use super::collaborator::Classification;

const PACKAGE_JSON: &str = r#"{
  "name": "kiln-preview",
  "private": true,
  "version": "0.0.0",
  "scripts": { "dev": "vite" },
  "dependencies": { "react": "^18.2.0", "react-dom": "^18.2.0" },
  "devDependencies": { "vite": "^5.4.2", "@vitejs/plugin-react": "^4.0.0" }
}
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
  resolve: {
    extensions: ['.js', '.ts', '.tsx'],
  },
});
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Generated App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const MAIN_TSX: &str = r#"import { StrictMode } from 'react';
import { createRoot } from 'react-dom/client';
import App from './App';
import './index.css';

createRoot(document.getElementById('root')!).render(
  <StrictMode>
    <App />
  </StrictMode>
);
"#;

const APP_TSX: &str = r#"import React from 'react';

export default function App() {
  return <h1>Generated app</h1>;
}
"#;

const INDEX_CSS: &str = r#"body {
  margin: 0;
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif;
}
"#;

/// The scaffold table, in insertion order.
pub const SCAFFOLD_FILES: &[(&str, &str)] = &[
    ("package.json", PACKAGE_JSON),
    ("vite.config.ts", VITE_CONFIG),
    ("index.html", INDEX_HTML),
    ("src/main.tsx", MAIN_TSX),
    ("src/App.tsx", APP_TSX),
    ("src/index.css", INDEX_CSS),
];

/// Insert the scaffold defaults for any path the map does not already have.
///
/// No-op unless the classification is scaffold-eligible.
pub fn apply_scaffold(files: &mut FileMap, classification: Classification) {
    if !classification.scaffold_eligible() {
        return;
    }
    for (path, content) in SCAFFOLD_FILES {
        if !files.contains_key(*path) {
            tracing::debug!(path = *path, "inserting scaffold default");
            files.insert((*path).to_string(), (*content).to_string());
        }
    }
}

//! The playground page.

use axum::response::Html;

/// Serve the playground page.
pub async fn home_handler() -> Html<&'static str> {
    Html(PAGE)
}

// `/js/app.js` is optional; the page works with the plain textarea.
const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
	<meta charset="utf-8" />
	<meta http-equiv="X-UA-Compatible" content="IE=edge">
	<title>Sandpit Playground</title>
	<meta name="viewport" content="width=device-width, initial-scale=1">
	<style>
		* { box-sizing: border-box; }
		html, body {
			height: 100%;
			margin: 0;
			padding: 0;
			font-family: "avenir-next", helvetica, sans-serif;
			display: flex;
			flex-direction: column;
		}
		button {
			padding: 10px 20px;
			border-radius: 3px;
			font-weight: bold;
			font-size: 16px;
			color: white;
			background: #2980b9;
			border: 0;
			cursor: pointer;
		}
		#toolbar { padding: 10px; display: flex; gap: 10px; align-items: center; }
		#toolbar h3 { flex: 1; margin: 0; }
		#values { padding: 10px; display: flex; gap: 20px; }
		#editor {
			flex: 1 1 50%;
			min-height: 400px;
			width: 100%;
			font-family: monospace;
			font-size: 14px;
			padding: 10px;
			border: 0;
			border-top: 1px solid #ddd;
		}
		#output {
			width: 100%;
			flex: 1 2 300px;
			padding: 25px 20px;
			overflow-y: auto;
			background: #f2f2f2;
			font-family: monospace;
			white-space: pre-wrap;
		}
		.error { color: red; }
	</style>
</head>
<body>
	<div id="toolbar">
		<h3>Sandpit Playground</h3>
		<button id="run">Run</button>
		<button id="transform">Run as transform</button>
	</div>
	<div id="values">
		<div>
			<label for="config">config</label>
			<input id="config" name="config" type="text">
			<small><i>key,value,key,value,...</i></small>
		</div>
		<div>
			<label for="secrets">secrets</label>
			<input id="secrets" name="secrets" type="text">
			<small><i>key,value,key,value,...</i></small>
		</div>
	</div>
	<textarea id="editor" spellcheck="false">print("hello, sandpit");</textarea>
	<div id="output"></div>

	<script>
		const output = document.getElementById("output");
		const editor = document.getElementById("editor");

		async function submit(url) {
			output.textContent = "";
			output.className = "";
			const res = await fetch(url, { method: "POST", body: editor.value });
			if (!res.ok) output.className = "error";
			const reader = res.body.getReader();
			const decoder = new TextDecoder();
			for (;;) {
				const { done, value } = await reader.read();
				if (done) break;
				output.textContent += decoder.decode(value, { stream: true });
			}
		}

		document.getElementById("run").onclick = () => submit("/exec");
		document.getElementById("transform").onclick = () => {
			const params = new URLSearchParams();
			const config = document.getElementById("config").value;
			const secrets = document.getElementById("secrets").value;
			if (config) params.set("config", config);
			if (secrets) params.set("secrets", secrets);
			submit("/qri?" + params.toString());
		};
	</script>
	<script src="/js/app.js" onerror="this.remove()"></script>
</body>
</html>"#;
